//! Per-message game actions.
//!
//! Every handler reads the bound player from the session, applies at most a
//! few guarded store statements and optionally replies on the session's own
//! connection. Store failures are returned to the router, which logs them.

mod economy;
mod items;
mod map;
mod snapshot;
mod vitals;

pub use snapshot::build_snapshot;

use mythic_core::net::messages::{ClientMessage, ServerMessage, TimestampMsg};
use mythic_core::player::{PlayerId, PlayerRecord};
use mythic_core::time::timestamp_millis;

use crate::error::StoreError;
use crate::registry::Session;
use crate::state::AppState;
use crate::store::{PlayerStore, PlayerUpdate};

pub type HandlerResult = Result<(), StoreError>;

/// What a handler may touch: shared state plus the requesting session.
pub struct Ctx<'a> {
    pub state: &'a AppState,
    pub session: &'a Session,
}

impl Ctx<'_> {
    pub fn player(&self) -> &PlayerId {
        &self.session.player_id
    }

    pub fn store(&self) -> &dyn PlayerStore {
        self.state.store.as_ref()
    }

    pub fn reply(&self, msg: ServerMessage) {
        if let Err(e) = self.session.handle.send(&msg) {
            tracing::warn!(
                player_id = %self.session.player_id,
                conn = %self.session.conn,
                error = %e,
                "Failed to queue reply"
            );
        }
    }

    pub async fn update(&self, update: PlayerUpdate) -> Result<Option<PlayerRecord>, StoreError> {
        self.store().update_player(self.player(), update).await
    }
}

/// Run the action for one decoded client message.
pub async fn handle(ctx: &Ctx<'_>, msg: ClientMessage) -> HandlerResult {
    match msg {
        ClientMessage::PlayerData => snapshot::player_data(ctx).await,
        ClientMessage::LifeUpdate(m) => vitals::life_update(ctx, m).await,
        ClientMessage::EnergyUpdate(m) => vitals::energy_update(ctx, *m).await,
        ClientMessage::DeathUpdate => vitals::death_update(ctx).await,
        ClientMessage::TilemapCreate(m) => map::tilemap_create(ctx, m).await,
        ClientMessage::SaveTilemap(m) => map::save_tilemap(ctx, m).await,
        ClientMessage::MinedRock(m) => map::mined_rock(ctx, m).await,
        ClientMessage::DeleteOre(m) => map::delete_ore(ctx, m).await,
        ClientMessage::SellOres => economy::sell_ores(ctx).await,
        ClientMessage::HellyHeal(m) => economy::helly_heal(ctx, m).await,
        ClientMessage::HellyRestoreEnergy(m) => economy::helly_restore_energy(ctx, m).await,
        ClientMessage::BuyItem(m) => economy::buy_item(ctx, m).await,
        ClientMessage::ConvertAmazonite(m) => economy::convert_amazonite(ctx, m).await,
        ClientMessage::UseTeleport(m) => items::use_teleport(ctx, m).await,
        ClientMessage::UseHeal(m) => items::use_heal(ctx, m).await,
        ClientMessage::UseEnergy(m) => items::use_energy(ctx, m).await,
        ClientMessage::UseAntiFire => items::use_anti_fire(ctx).await,
        ClientMessage::UseBomb => items::use_bomb(ctx).await,
        ClientMessage::ExplosiveTile => Ok(()),
        ClientMessage::Ping => {
            ctx.reply(ServerMessage::Pong(TimestampMsg {
                timestamp: timestamp_millis(),
            }));
            Ok(())
        },
        ClientMessage::Pong => {
            ctx.state.registry.mark_alive(ctx.session.conn);
            Ok(())
        },
    }
}

/// Largest magnitude accepted from a client number.
const CLIENT_LIMIT: f64 = 1e12;

/// Client numbers are JSON floats; stored counters are integers. Values are
/// clamped so later arithmetic on them cannot overflow.
fn whole(value: f64) -> i64 {
    value.clamp(-CLIENT_LIMIT, CLIENT_LIMIT).trunc() as i64
}
