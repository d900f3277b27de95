use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use mythic_core::equipment::{NftKey, NftRecord};
use mythic_core::player::{PlayerId, PlayerRecord};
use mythic_core::zone::Zone;

use super::{PlayerStore, PlayerUpdate, Subscription};
use crate::error::StoreError;

#[derive(Default)]
struct StoreData {
    players: HashMap<PlayerId, PlayerRecord>,
    maps: HashMap<(PlayerId, Zone), Vec<i64>>,
    subscriptions: Vec<Subscription>,
    nfts: HashMap<NftKey, NftRecord>,
}

/// In-process document store. Each call runs under one mutex, so every
/// `update_player` is a single atomic statement.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<StoreData>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing (or regaining) the connection to the store.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    fn lock(&self) -> MutexGuard<'_, StoreData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn data(&self) -> Result<MutexGuard<'_, StoreData>, StoreError> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(self.lock())
    }

    pub fn insert_player(&self, record: PlayerRecord) {
        self.lock().players.insert(record.id.clone(), record);
    }

    pub fn insert_map(&self, id: &PlayerId, zone: Zone, tiles: Vec<i64>) {
        self.lock().maps.insert((id.clone(), zone), tiles);
    }

    pub fn insert_subscription(&self, subscription: Subscription) {
        self.lock().subscriptions.push(subscription);
    }

    pub fn insert_nft(&self, record: NftRecord) {
        self.lock().nfts.insert(record.key, record);
    }

    pub fn player(&self, id: &PlayerId) -> Option<PlayerRecord> {
        self.lock().players.get(id).cloned()
    }

    pub fn zone_map(&self, id: &PlayerId, zone: Zone) -> Option<Vec<i64>> {
        self.lock().maps.get(&(id.clone(), zone)).cloned()
    }
}

#[async_trait]
impl PlayerStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.data().map(|_| ())
    }

    async fn find_player(&self, id: &PlayerId) -> Result<Option<PlayerRecord>, StoreError> {
        Ok(self.data()?.players.get(id).cloned())
    }

    async fn update_player(
        &self,
        id: &PlayerId,
        update: PlayerUpdate,
    ) -> Result<Option<PlayerRecord>, StoreError> {
        let mut data = self.data()?;
        let Some(record) = data.players.get_mut(id) else {
            return Ok(None);
        };
        let Some(next) = update.apply(record)? else {
            return Ok(None);
        };
        *record = next.clone();
        Ok(Some(next))
    }

    async fn bind_connection(
        &self,
        id: &PlayerId,
        session_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut data = self.data()?;
        if let Some(record) = data.players.get_mut(id) {
            record.connection_id = Some(session_id.to_string());
            record.last_connected_at = Some(at);
        }
        Ok(())
    }

    async fn clear_connection(&self, session_id: &str) -> Result<(), StoreError> {
        let mut data = self.data()?;
        for record in data.players.values_mut() {
            if record.connection_id.as_deref() == Some(session_id) {
                record.connection_id = None;
                record.last_connected_at = None;
            }
        }
        Ok(())
    }

    async fn find_maps(&self, id: &PlayerId) -> Result<Vec<(Zone, Vec<i64>)>, StoreError> {
        self.find_zone_maps(id, &Zone::ALL).await
    }

    async fn find_zone_maps(
        &self,
        id: &PlayerId,
        zones: &[Zone],
    ) -> Result<Vec<(Zone, Vec<i64>)>, StoreError> {
        let data = self.data()?;
        Ok(zones
            .iter()
            .filter_map(|&zone| {
                data.maps
                    .get(&(id.clone(), zone))
                    .map(|tiles| (zone, tiles.clone()))
            })
            .collect())
    }

    async fn upsert_map(
        &self,
        id: &PlayerId,
        zone: Zone,
        tiles: Vec<i64>,
    ) -> Result<(), StoreError> {
        self.data()?.maps.insert((id.clone(), zone), tiles);
        Ok(())
    }

    async fn clear_tiles(
        &self,
        id: &PlayerId,
        zone: Zone,
        indices: &[usize],
    ) -> Result<(), StoreError> {
        let mut data = self.data()?;
        if let Some(tiles) = data.maps.get_mut(&(id.clone(), zone)) {
            for &i in indices {
                if let Some(tile) = tiles.get_mut(i) {
                    *tile = 0;
                }
            }
        }
        Ok(())
    }

    async fn active_subscription(
        &self,
        id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, StoreError> {
        let data = self.data()?;
        Ok(data
            .subscriptions
            .iter()
            .filter(|s| &s.player_id == id && s.is_active(now))
            .max_by_key(|s| s.end)
            .cloned())
    }

    async fn nft_metadata(&self, keys: &[NftKey]) -> Result<Vec<NftRecord>, StoreError> {
        let data = self.data()?;
        Ok(keys
            .iter()
            .filter_map(|key| data.nfts.get(key).cloned())
            .collect())
    }
}
