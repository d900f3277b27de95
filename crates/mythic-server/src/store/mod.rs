//! Persistent player store seam.
//!
//! Every mutation goes through [`PlayerStore::update_player`], which applies
//! a [`PlayerUpdate`] as one conditional statement: either all guards hold and
//! every op is applied, or nothing changes.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use mythic_core::economy::ConversionLog;
use mythic_core::equipment::{NftKey, NftRecord};
use mythic_core::item::ItemKind;
use mythic_core::ore::OreKind;
use mythic_core::player::{PlayerId, PlayerRecord, Position};
use mythic_core::time::fresh_count;
use mythic_core::zone::Zone;

use crate::error::StoreError;

/// A numeric player field addressable by set/increment ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Life,
    Energy,
    MinerPoints,
    Amazonites,
    Ore(OreKind),
    Item(ItemKind),
}

/// Precondition evaluated atomically with the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    PointsAtLeast(i64),
    ItemAtLeast(ItemKind, i64),
    /// The given log holds exactly `equals` entries from the current UTC day.
    FreshConversions {
        log: ConversionLog,
        now: DateTime<Utc>,
        equals: usize,
    },
    /// No death recorded at or after the given instant.
    NoDeathSince(DateTime<Utc>),
}

impl Guard {
    fn holds(&self, record: &PlayerRecord) -> bool {
        match *self {
            Self::PointsAtLeast(n) => record.miner_points >= n,
            Self::ItemAtLeast(item, n) => record.items.get(item) >= n,
            Self::FreshConversions { log, now, equals } => {
                fresh_count(record.conversions(log), now) == equals
            },
            Self::NoDeathSince(t) => record.deaths.iter().all(|&d| d < t),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Set(Field, i64),
    Inc(Field, i64),
    SetPosition(Position),
    PushDeath(DateTime<Utc>),
    PushConversion(ConversionLog, DateTime<Utc>),
    SetMapCreatedAt(Option<DateTime<Utc>>),
    ResetOres,
    ResetItems,
    /// Credit the sale value of all ores and zero the ore counts.
    SellOres,
}

/// A guarded batch of field operations on one player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerUpdate {
    guards: Vec<Guard>,
    ops: Vec<Op>,
}

impl PlayerUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn op(mut self, op: Op) -> Self {
        self.ops.push(op);
        self
    }

    pub fn set(self, field: Field, value: i64) -> Self {
        self.op(Op::Set(field, value))
    }

    pub fn inc(self, field: Field, delta: i64) -> Self {
        self.op(Op::Inc(field, delta))
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Compute the post-image of `record`. Returns `Ok(None)` when a guard
    /// fails and an error when the result breaks a schema rule.
    pub fn apply(&self, record: &PlayerRecord) -> Result<Option<PlayerRecord>, StoreError> {
        if !self.guards.iter().all(|g| g.holds(record)) {
            return Ok(None);
        }
        let mut next = record.clone();
        for op in &self.ops {
            match op {
                Op::Set(field, value) => *field_mut(&mut next, *field) = *value,
                Op::Inc(field, delta) => {
                    let slot = field_mut(&mut next, *field);
                    *slot = slot.checked_add(*delta).ok_or_else(|| overflow(*field))?;
                },
                Op::SetPosition(pos) => next.position = *pos,
                Op::PushDeath(at) => next.deaths.push(*at),
                Op::PushConversion(log, at) => next.conversions_mut(*log).push(*at),
                Op::SetMapCreatedAt(at) => next.map_created_at = *at,
                Op::ResetOres => next.ores.clear(),
                Op::ResetItems => next.items.clear(),
                Op::SellOres => {
                    next.miner_points = next
                        .ores
                        .sale_value()
                        .and_then(|earned| next.miner_points.checked_add(earned))
                        .ok_or_else(|| overflow(Field::MinerPoints))?;
                    next.ores.clear();
                },
            }
        }
        if next.miner_points < 0 {
            return Err(StoreError::Validation(
                "Miner points cannot be negative".to_string(),
            ));
        }
        Ok(Some(next))
    }
}

fn overflow(field: Field) -> StoreError {
    StoreError::Validation(format!("{field:?} out of range"))
}

fn field_mut(record: &mut PlayerRecord, field: Field) -> &mut i64 {
    match field {
        Field::Life => &mut record.life,
        Field::Energy => &mut record.energy,
        Field::MinerPoints => &mut record.miner_points,
        Field::Amazonites => &mut record.amazonites,
        Field::Ore(ore) => record.ores.slot_mut(ore),
        Field::Item(item) => record.items.slot_mut(item),
    }
}

/// A VIP subscription period.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub player_id: PlayerId,
    pub plan: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Subscription {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.end >= now
    }
}

/// Document store holding players, zone maps, subscriptions and NFT metadata.
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Cheap connectivity probe used by `/status`.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_player(&self, id: &PlayerId) -> Result<Option<PlayerRecord>, StoreError>;

    /// Apply `update` atomically. Returns the post-image, or `None` when the
    /// player does not exist or a guard failed.
    async fn update_player(
        &self,
        id: &PlayerId,
        update: PlayerUpdate,
    ) -> Result<Option<PlayerRecord>, StoreError>;

    /// Record the live session on the player document.
    async fn bind_connection(
        &self,
        id: &PlayerId,
        session_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Clear the live-session reference of whichever player still points at
    /// `session_id`. A newer session's reference is left untouched.
    async fn clear_connection(&self, session_id: &str) -> Result<(), StoreError>;

    async fn find_maps(&self, id: &PlayerId) -> Result<Vec<(Zone, Vec<i64>)>, StoreError>;

    async fn find_zone_maps(
        &self,
        id: &PlayerId,
        zones: &[Zone],
    ) -> Result<Vec<(Zone, Vec<i64>)>, StoreError>;

    async fn upsert_map(&self, id: &PlayerId, zone: Zone, tiles: Vec<i64>)
    -> Result<(), StoreError>;

    /// Overwrite the given tiles with 0. Indices past the end are ignored.
    async fn clear_tiles(
        &self,
        id: &PlayerId,
        zone: Zone,
        indices: &[usize],
    ) -> Result<(), StoreError>;

    async fn active_subscription(
        &self,
        id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, StoreError>;

    async fn nft_metadata(&self, keys: &[NftKey]) -> Result<Vec<NftRecord>, StoreError>;
}
