use chrono::Utc;
use serde_json::Value;

use mythic_core::net::messages::{
    ActionStatus, DeleteOreMsg, MinedRockMsg, SaveTilemapMsg, ServerMessage, TilemapCreateMsg,
};
use mythic_core::ore::OreKind;
use mythic_core::reveal::sanitize_indices;
use mythic_core::zone::Zone;

use super::{Ctx, HandlerResult};
use crate::store::{Field, Op, PlayerUpdate};

/// Tile arrays arrive JSON-encoded inside a string; a bare array is accepted.
fn parse_tilemap(value: &Value) -> Option<Vec<i64>> {
    match value {
        Value::String(s) => serde_json::from_str(s).ok(),
        Value::Array(_) => serde_json::from_value(value.clone()).ok(),
        _ => None,
    }
}

pub(super) async fn tilemap_create(ctx: &Ctx<'_>, msg: TilemapCreateMsg) -> HandlerResult {
    let zone = msg.name.parse::<Zone>();
    let tiles = parse_tilemap(&msg.tilemap);
    let (Ok(zone), Some(tiles)) = (zone, tiles) else {
        tracing::warn!(player_id = %ctx.player(), zone = %msg.name, "Rejected tilemap");
        ctx.reply(ServerMessage::TilemapCreate(ActionStatus::ERROR));
        return Ok(());
    };

    let stamp = PlayerUpdate::new().op(Op::SetMapCreatedAt(Some(Utc::now())));
    let len = tiles.len();
    let result = futures::try_join!(
        ctx.store().upsert_map(ctx.player(), zone, tiles),
        ctx.update(stamp),
    );
    let status = match result {
        Ok(_) => {
            tracing::debug!(player_id = %ctx.player(), zone = %zone.as_str(), tiles = len, "Zone map stored");
            ActionStatus::SUCCESS
        },
        Err(e) => {
            tracing::warn!(player_id = %ctx.player(), zone = %zone.as_str(), error = %e, "Failed to store zone map");
            ActionStatus::ERROR
        },
    };
    ctx.reply(ServerMessage::TilemapCreate(status));
    Ok(())
}

pub(super) async fn save_tilemap(ctx: &Ctx<'_>, msg: SaveTilemapMsg) -> HandlerResult {
    let Some(&index) = sanitize_indices(std::slice::from_ref(&msg.tile_index)).first() else {
        ctx.reply(ServerMessage::error("Invalid tile index"));
        return Ok(());
    };
    let Ok(zone) = msg.tilemap_name.parse::<Zone>() else {
        ctx.reply(ServerMessage::error("Unknown tilemap"));
        return Ok(());
    };

    if let Err(e) = ctx.store().clear_tiles(ctx.player(), zone, &[index]).await {
        tracing::warn!(player_id = %ctx.player(), zone = %zone.as_str(), error = %e, "Failed to save tilemap");
        ctx.reply(ServerMessage::error("Failed to save tilemap"));
        return Ok(());
    }
    ctx.reply(ServerMessage::SaveTilemap(ActionStatus::SUCCESS));
    Ok(())
}

pub(super) async fn mined_rock(ctx: &Ctx<'_>, msg: MinedRockMsg) -> HandlerResult {
    let Ok(ore) = msg.rock.parse::<OreKind>() else {
        tracing::debug!(player_id = %ctx.player(), rock = %msg.rock, "Unknown ore mined");
        return Ok(());
    };
    ctx.update(PlayerUpdate::new().inc(Field::Ore(ore), 1)).await?;
    Ok(())
}

pub(super) async fn delete_ore(ctx: &Ctx<'_>, msg: DeleteOreMsg) -> HandlerResult {
    let Ok(ore) = msg.ore.parse::<OreKind>() else {
        tracing::debug!(player_id = %ctx.player(), ore = %msg.ore, "Unknown ore deleted");
        return Ok(());
    };
    ctx.update(PlayerUpdate::new().set(Field::Ore(ore), 0)).await?;
    Ok(())
}
