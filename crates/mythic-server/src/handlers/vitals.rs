use std::collections::HashMap;

use chrono::{DateTime, Utc};

use mythic_core::net::messages::{ActionStatus, EnergyUpdateMsg, LifeUpdateMsg, ServerMessage};
use mythic_core::player::Position;
use mythic_core::reveal::{RevealPlan, sanitize_indices};
use mythic_core::time::{DEATH_COOLDOWN, death_cooldown_remaining};
use mythic_core::zone::Zone;

use super::{Ctx, HandlerResult, whole};
use crate::equipment::resolve_loadout;
use crate::store::{Field, Guard, Op, PlayerUpdate};

/// Earliest instant at which a recorded death still blocks vitals updates.
fn cooldown_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - chrono::Duration::milliseconds(DEATH_COOLDOWN.as_millis() as i64)
}

pub(super) async fn life_update(ctx: &Ctx<'_>, msg: LifeUpdateMsg) -> HandlerResult {
    let now = Utc::now();
    let Some(record) = ctx.store().find_player(ctx.player()).await? else {
        tracing::debug!(player_id = %ctx.player(), "life_update for missing player");
        return Ok(());
    };
    if let Some(wait) = death_cooldown_remaining(record.last_death(), now) {
        tracing::debug!(player_id = %ctx.player(), wait_ms = wait.as_millis() as u64, "Died recently, skipping life update");
        ctx.reply(ServerMessage::LifeUpdate(ActionStatus::death_too_recent(
            wait.as_millis() as u64,
        )));
        return Ok(());
    }

    let update = PlayerUpdate::new()
        .guard(Guard::NoDeathSince(cooldown_start(now)))
        .inc(Field::Life, -whole(msg.life));
    let status = match ctx.update(update).await? {
        Some(_) => ActionStatus::SUCCESS,
        // A death landed between the read and the write.
        None => ActionStatus::death_too_recent(DEATH_COOLDOWN.as_millis() as u64),
    };
    ctx.reply(ServerMessage::LifeUpdate(status));
    Ok(())
}

pub(super) async fn energy_update(ctx: &Ctx<'_>, msg: EnergyUpdateMsg) -> HandlerResult {
    if msg.energy > 0.0 {
        apply_energy_update(ctx, &msg).await?;
    }
    ctx.reply(ServerMessage::EnergyUpdate(ActionStatus::SUCCESS));
    Ok(())
}

/// Vitals, position and revealed tiles in one batch. Ore credits ride on the
/// vitals statement; each touched zone map gets its own clear statement, and
/// all statements run concurrently.
async fn apply_energy_update(ctx: &Ctx<'_>, msg: &EnergyUpdateMsg) -> HandlerResult {
    let mut update = PlayerUpdate::new()
        .set(Field::Energy, whole(msg.energy))
        .set(Field::Life, whole(msg.life));
    if let (Some(x), Some(y)) = (msg.x, msg.y) {
        update = update.op(Op::SetPosition(Position { x, y }));
    }

    let revealed = msg.revealed();
    if revealed.is_empty() {
        ctx.update(update).await?;
        return Ok(());
    }

    let zones: Vec<Zone> = revealed.iter().map(|(zone, _)| *zone).collect();
    let maps: HashMap<Zone, Vec<i64>> = ctx
        .store()
        .find_zone_maps(ctx.player(), &zones)
        .await?
        .into_iter()
        .collect();

    let mut totals = RevealPlan::default();
    let mut clears = Vec::new();
    for (zone, raw) in revealed {
        let tiles = maps.get(&zone).map(Vec::as_slice).unwrap_or_default();
        let plan = RevealPlan::compute(tiles, &sanitize_indices(raw));
        totals.merge_ores(&plan);
        if !plan.is_empty() {
            clears.push((zone, plan.cleared));
        }
    }
    for (ore, count) in totals.ores.iter().filter(|&(_, n)| n > 0) {
        update = update.inc(Field::Ore(ore), count);
    }

    let store = ctx.store();
    let player = ctx.player();
    let clear_all = futures::future::try_join_all(
        clears
            .iter()
            .map(|(zone, cleared)| store.clear_tiles(player, *zone, cleared)),
    );
    futures::try_join!(ctx.update(update), clear_all)?;
    tracing::debug!(
        player_id = %player,
        zones = clears.len(),
        "Applied tile reveal batch"
    );
    Ok(())
}

pub(super) async fn death_update(ctx: &Ctx<'_>) -> HandlerResult {
    let now = Utc::now();
    let Some(record) = ctx.store().find_player(ctx.player()).await? else {
        tracing::debug!(player_id = %ctx.player(), "death_update for missing player");
        return Ok(());
    };
    if death_cooldown_remaining(record.last_death(), now).is_some() {
        tracing::debug!(player_id = %ctx.player(), "Died recently, skipping death update");
        return Ok(());
    }

    let loadout = resolve_loadout(
        ctx.state.equipment.as_ref(),
        ctx.store(),
        ctx.player(),
        ctx.state.config.equipment.token_id_offset,
    )
    .await;

    let respawn = PlayerUpdate::new()
        .guard(Guard::NoDeathSince(cooldown_start(now)))
        .set(Field::Life, loadout.max_life)
        .set(Field::Energy, loadout.max_energy)
        .set(Field::MinerPoints, 0)
        .op(Op::ResetOres)
        .op(Op::ResetItems)
        .op(Op::PushDeath(now))
        .op(Op::SetMapCreatedAt(None));
    if ctx.update(respawn).await?.is_none() {
        tracing::debug!(player_id = %ctx.player(), "Concurrent death already recorded");
        return Ok(());
    }

    tracing::info!(player_id = %ctx.player(), "Player died, progress reset");
    ctx.reply(ServerMessage::DeathUpdate(ActionStatus::SUCCESS));
    Ok(())
}
