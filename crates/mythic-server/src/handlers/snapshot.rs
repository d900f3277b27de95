use chrono::Utc;

use mythic_core::net::messages::ServerMessage;
use mythic_core::player::{PlayerId, PlayerSnapshot};

use super::{Ctx, HandlerResult};
use crate::equipment::resolve_loadout;
use crate::error::StoreError;
use crate::state::AppState;

/// Join the player record, subscription, zone maps and loadout into a
/// `player_data` snapshot. The four lookups run concurrently.
pub async fn build_snapshot(state: &AppState, player: &PlayerId) -> Result<PlayerSnapshot, StoreError> {
    let now = Utc::now();
    let store = state.store.as_ref();
    let (record, subscription, maps, loadout) = futures::join!(
        store.find_player(player),
        store.active_subscription(player, now),
        store.find_maps(player),
        resolve_loadout(
            state.equipment.as_ref(),
            store,
            player,
            state.config.equipment.token_id_offset,
        ),
    );
    let record = record?;
    if record.is_none() {
        tracing::debug!(player_id = %player, "No player record, snapshot uses baseline values");
    }
    Ok(PlayerSnapshot::assemble(
        record.as_ref(),
        subscription?.is_some(),
        &maps?,
        &loadout,
        now,
    ))
}

pub(super) async fn player_data(ctx: &Ctx<'_>) -> HandlerResult {
    let snapshot = build_snapshot(ctx.state, ctx.player()).await?;
    ctx.reply(ServerMessage::PlayerData(Box::new(snapshot)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use mythic_core::equipment::{EquipmentSlot, NftCategory, NftKey, NftMetadata, NftRecord};
    use mythic_core::net::messages::ClientMessage;
    use mythic_core::ore::OreKind;
    use mythic_core::zone::Zone;
    use serde_json::json;

    use super::*;
    use crate::equipment::{EquippedToken, StaticLoadout};
    use crate::handlers::test_support::Harness;
    use crate::store::Subscription;

    #[tokio::test]
    async fn snapshot_reflects_record_and_maps() {
        let mut h = Harness::new().await;
        let now = Utc::now();
        h.edit(|r| {
            r.miner_points = 4_200;
            r.ores.set(OreKind::Gold, 3);
            r.amazonite_converted = vec![now - Duration::days(1), now];
            r.map_created_at = Some(now);
        });
        h.store.insert_map(&h.id(), Zone::Z2s1, vec![0, 4, 9]);

        h.send(ClientMessage::PlayerData).await;
        let reply = h.reply().unwrap();
        assert_eq!(reply["type"], "player_data");
        let data = &reply["data"];
        assert_eq!(data["minerPoints"], 4_200);
        assert_eq!(data["Gold"], 3);
        assert_eq!(data["Coal"], 0);
        assert_eq!(data["buyedToday"], 1);
        assert_eq!(data["shouldCreateMap"], false);
        assert_eq!(data["isVip"], false);
        assert_eq!(data["z2s1"], "[0,4,9]");
        assert!(data.get("z1s1").is_none());
        assert_eq!(data["helmet"], "helmet-common");
        assert!(data.get("relic").is_none());
    }

    #[tokio::test]
    async fn active_subscription_marks_vip() {
        let mut h = Harness::new().await;
        let now = Utc::now();
        h.store.insert_subscription(Subscription {
            player_id: h.id(),
            plan: "monthly".to_string(),
            start: now - Duration::days(1),
            end: now + Duration::days(1),
        });
        h.send(ClientMessage::PlayerData).await;
        assert_eq!(h.reply().unwrap()["data"]["isVip"], true);
    }

    #[tokio::test]
    async fn equipped_relic_and_helmet_show_up() {
        let lookup = StaticLoadout::new(vec![
            EquippedToken {
                slot: EquipmentSlot::Helmet,
                contract: "0xequip".to_string(),
                token_id: 7,
            },
            EquippedToken {
                slot: EquipmentSlot::Relic,
                contract: "0xrelic".to_string(),
                token_id: 2,
            },
        ]);
        let mut h = Harness::with_equipment(lookup).await;
        let metadata = |value: serde_json::Value| -> NftMetadata { serde_json::from_value(value).unwrap() };
        h.store.insert_nft(NftRecord {
            key: NftKey {
                category: NftCategory::Equipments,
                token_id: 7,
            },
            metadata: metadata(json!({
                "image": "/equipments/helmets/viking-b.png",
                "attributes": [
                    {"trait_type": "Category", "value": "Helmet"},
                    {"trait_type": "Health", "value": 70}
                ]
            })),
        });
        h.store.insert_nft(NftRecord {
            key: NftKey {
                category: NftCategory::Relics,
                token_id: 2,
            },
            metadata: metadata(json!({
                "image": "/relics/owl.png",
                "attributes": [{"trait_type": "Amazonite Conversion", "value": 25}]
            })),
        });

        h.send(ClientMessage::PlayerData).await;
        let data = h.reply().unwrap()["data"].clone();
        assert_eq!(data["helmet"], "helmet-viking");
        assert_eq!(data["maxLife"], 70);
        assert_eq!(data["relic"], "owl");
    }

    #[tokio::test]
    async fn store_outage_is_reported_to_router() {
        let h = Harness::new().await;
        h.store.set_offline(true);
        assert!(h.try_send(ClientMessage::PlayerData).await.is_err());
    }
}
