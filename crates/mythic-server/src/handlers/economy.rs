use chrono::Utc;

use mythic_core::economy::{ConversionLog, ConversionTier};
use mythic_core::item::ItemKind;
use mythic_core::net::messages::{
    ActionStatus, AmazoniteSuccessMsg, BuyItemMsg, ConvertAmazoniteMsg, HellyHealMsg,
    HellyRestoreEnergyMsg, ServerMessage,
};
use mythic_core::time::fresh_count;

use super::{Ctx, HandlerResult, whole};
use crate::equipment::resolve_loadout;
use crate::store::{Field, Guard, Op, PlayerUpdate};

pub(super) async fn sell_ores(ctx: &Ctx<'_>) -> HandlerResult {
    if let Some(after) = ctx.update(PlayerUpdate::new().op(Op::SellOres)).await? {
        tracing::debug!(player_id = %ctx.player(), miner_points = after.miner_points, "Ores sold");
    }
    ctx.reply(ServerMessage::SellOres(ActionStatus::SUCCESS));
    Ok(())
}

/// Overwrite the balance with a client-computed one. The client may only
/// spend: the new balance must be non-negative and not above the stored one.
fn spend_to(miner_points: f64) -> Option<PlayerUpdate> {
    let points = whole(miner_points);
    (points >= 0).then(|| {
        PlayerUpdate::new()
            .guard(Guard::PointsAtLeast(points))
            .set(Field::MinerPoints, points)
    })
}

pub(super) async fn helly_heal(ctx: &Ctx<'_>, msg: HellyHealMsg) -> HandlerResult {
    let Some(update) = spend_to(msg.miner_points) else {
        tracing::warn!(player_id = %ctx.player(), "Negative balance in helly_heal");
        return Ok(());
    };
    let update = update.set(Field::Life, whole(msg.current_life));
    if ctx.update(update).await?.is_none() {
        tracing::warn!(player_id = %ctx.player(), "Rejected helly_heal: balance would rise");
    }
    Ok(())
}

pub(super) async fn helly_restore_energy(ctx: &Ctx<'_>, msg: HellyRestoreEnergyMsg) -> HandlerResult {
    let Some(update) = spend_to(msg.miner_points) else {
        tracing::warn!(player_id = %ctx.player(), "Negative balance in helly_restore_energy");
        return Ok(());
    };
    let update = update.set(Field::Energy, whole(msg.current_energy));
    if ctx.update(update).await?.is_none() {
        tracing::warn!(player_id = %ctx.player(), "Rejected helly_restore_energy: balance would rise");
    }
    Ok(())
}

pub(super) async fn buy_item(ctx: &Ctx<'_>, msg: BuyItemMsg) -> HandlerResult {
    let item = msg.item.parse::<ItemKind>();
    let update = spend_to(msg.miner_points);
    let (Ok(item), Some(update)) = (item, update) else {
        tracing::warn!(player_id = %ctx.player(), item = %msg.item, "Rejected buy_item");
        ctx.reply(ServerMessage::BuyItem(ActionStatus::REJECTED));
        return Ok(());
    };

    let status = match ctx.update(update.inc(Field::Item(item), 1)).await? {
        Some(_) => ActionStatus::SUCCESS,
        None => {
            tracing::warn!(player_id = %ctx.player(), item = %item, "Rejected buy_item: balance would rise");
            ActionStatus::REJECTED
        },
    };
    ctx.reply(ServerMessage::BuyItem(status));
    Ok(())
}

/// Rung of the ladder named by the client's button index.
fn ladder_tier(button_index: f64) -> Option<ConversionTier> {
    if button_index < 0.0 || button_index.fract() != 0.0 {
        return None;
    }
    ConversionTier::get(button_index as usize)
}

pub(super) async fn convert_amazonite(ctx: &Ctx<'_>, msg: ConvertAmazoniteMsg) -> HandlerResult {
    let player = ctx.player();
    let Some(tier) = ladder_tier(msg.button_index) else {
        tracing::warn!(player_id = %player, button_index = msg.button_index, "Invalid conversion tier");
        return Ok(());
    };
    let now = Utc::now();

    if msg.is_vip && ctx.store().active_subscription(player, now).await?.is_none() {
        tracing::warn!(player_id = %player, "VIP conversion without active subscription");
        return Ok(());
    }

    let Some(record) = ctx.store().find_player(player).await? else {
        return Ok(());
    };
    if record.miner_points <= 0 || record.miner_points < tier.price {
        tracing::debug!(
            player_id = %player,
            miner_points = record.miner_points,
            price = tier.price,
            "Not enough points to convert"
        );
        return Ok(());
    }
    let log = ConversionLog::for_vip(msg.is_vip);
    let done_today = fresh_count(record.conversions(log), now);
    if done_today != tier.index {
        tracing::debug!(player_id = %player, done_today, tier = tier.index, "Conversion out of ladder order");
        return Ok(());
    }

    let loadout = resolve_loadout(
        ctx.state.equipment.as_ref(),
        ctx.store(),
        player,
        ctx.state.config.equipment.token_id_offset,
    )
    .await;
    let payout = tier.boosted_payout(loadout.amz_conversion);

    let update = PlayerUpdate::new()
        .guard(Guard::PointsAtLeast(tier.price))
        .guard(Guard::FreshConversions {
            log,
            now,
            equals: tier.index,
        })
        .inc(Field::MinerPoints, -tier.price)
        .inc(Field::Amazonites, payout)
        .op(Op::PushConversion(log, now));
    if ctx.update(update).await?.is_none() {
        tracing::warn!(player_id = %player, tier = tier.index, "Conversion lost a concurrent race");
        return Ok(());
    }

    tracing::info!(
        player_id = %player,
        tier = tier.index,
        price = tier.price,
        payout,
        vip = msg.is_vip,
        "Amazonite converted"
    );
    ctx.reply(ServerMessage::AmazoniteSuccess(AmazoniteSuccessMsg {
        request_id: msg.request_id,
    }));
    Ok(())
}
