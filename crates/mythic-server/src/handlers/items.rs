use mythic_core::item::ItemKind;
use mythic_core::net::messages::{UseEnergyMsg, UseHealMsg, UseTeleportMsg};
use mythic_core::player::Position;

use super::{Ctx, HandlerResult, whole};
use crate::store::{Field, Guard, Op, PlayerUpdate};

/// Spend one `item` together with its effect. Without stock nothing changes.
async fn consume(ctx: &Ctx<'_>, item: ItemKind, effect: PlayerUpdate) -> HandlerResult {
    let update = effect
        .guard(Guard::ItemAtLeast(item, 1))
        .inc(Field::Item(item), -1);
    if ctx.update(update).await?.is_none() {
        tracing::debug!(player_id = %ctx.player(), item = %item, "Item use without stock");
    }
    Ok(())
}

pub(super) async fn use_teleport(ctx: &Ctx<'_>, msg: UseTeleportMsg) -> HandlerResult {
    let effect = PlayerUpdate::new().op(Op::SetPosition(Position {
        x: msg.position_x,
        y: msg.position_y,
    }));
    consume(ctx, ItemKind::TeleportPill, effect).await
}

pub(super) async fn use_heal(ctx: &Ctx<'_>, msg: UseHealMsg) -> HandlerResult {
    let effect = PlayerUpdate::new().set(Field::Life, whole(msg.current_life));
    consume(ctx, ItemKind::Medkit, effect).await
}

pub(super) async fn use_energy(ctx: &Ctx<'_>, msg: UseEnergyMsg) -> HandlerResult {
    let effect = PlayerUpdate::new().set(Field::Energy, whole(msg.current_energy));
    consume(ctx, ItemKind::EnergyDrink, effect).await
}

pub(super) async fn use_anti_fire(ctx: &Ctx<'_>) -> HandlerResult {
    consume(ctx, ItemKind::FireResistancePotion, PlayerUpdate::new()).await
}

pub(super) async fn use_bomb(ctx: &Ctx<'_>) -> HandlerResult {
    consume(ctx, ItemKind::Bomb, PlayerUpdate::new()).await
}

#[cfg(test)]
mod tests {
    use mythic_core::net::messages::ClientMessage;

    use super::*;
    use crate::handlers::test_support::Harness;

    #[tokio::test]
    async fn teleport_moves_and_spends_pill() {
        let mut h = Harness::new().await;
        h.edit(|r| r.items.set(ItemKind::TeleportPill, 2));
        h.send(ClientMessage::UseTeleport(UseTeleportMsg {
            position_x: 40.0,
            position_y: -12.5,
        }))
        .await;
        let r = h.record();
        assert_eq!(r.items.get(ItemKind::TeleportPill), 1);
        assert_eq!(r.position, Position { x: 40.0, y: -12.5 });
        assert!(h.reply().is_none());
    }

    #[tokio::test]
    async fn use_without_stock_changes_nothing() {
        let h = Harness::new().await;
        let before = h.record();
        h.send(ClientMessage::UseTeleport(UseTeleportMsg {
            position_x: 1.0,
            position_y: 1.0,
        }))
        .await;
        h.send(ClientMessage::UseHeal(UseHealMsg { current_life: 99.0 })).await;
        h.send(ClientMessage::UseBomb).await;
        assert_eq!(h.record(), before);
    }

    #[tokio::test]
    async fn each_consumable_decrements_its_own_count() {
        let h = Harness::new().await;
        h.edit(|r| {
            for item in ItemKind::ALL {
                r.items.set(item, 1);
            }
        });
        h.send(ClientMessage::UseHeal(UseHealMsg { current_life: 44.0 })).await;
        h.send(ClientMessage::UseEnergy(UseEnergyMsg {
            current_energy: 120.0,
        }))
        .await;
        h.send(ClientMessage::UseAntiFire).await;
        h.send(ClientMessage::UseBomb).await;

        let r = h.record();
        assert_eq!(r.life, 44);
        assert_eq!(r.energy, 120);
        assert_eq!(r.items.get(ItemKind::Medkit), 0);
        assert_eq!(r.items.get(ItemKind::EnergyDrink), 0);
        assert_eq!(r.items.get(ItemKind::FireResistancePotion), 0);
        assert_eq!(r.items.get(ItemKind::Bomb), 0);
        assert_eq!(r.items.get(ItemKind::TeleportPill), 1);
    }
}
