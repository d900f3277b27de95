use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::economy::ConversionLog;
use crate::equipment::{COMMON_ENERGY, COMMON_HEALTH, Loadout};
use crate::item::{ItemCounts, ItemKind};
use crate::ore::{OreCounts, OreKind};
use crate::time::{fresh_count, is_stale};
use crate::zone::Zone;

/// Stable player identity (the player's wallet address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Default for Position {
    fn default() -> Self {
        Self { x: -8.0, y: -1.0 }
    }
}

/// Durable per-player game state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub life: i64,
    pub energy: i64,
    pub ores: OreCounts,
    pub items: ItemCounts,
    pub position: Position,
    pub miner_points: i64,
    pub amazonites: i64,
    pub deaths: Vec<DateTime<Utc>>,
    pub amazonite_converted: Vec<DateTime<Utc>>,
    pub vip_amazonite_converted: Vec<DateTime<Utc>>,
    pub map_created_at: Option<DateTime<Utc>>,
    /// Session id of the live connection, if any.
    pub connection_id: Option<String>,
    pub last_connected_at: Option<DateTime<Utc>>,
}

impl PlayerRecord {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            life: COMMON_HEALTH,
            energy: COMMON_ENERGY,
            ores: OreCounts::default(),
            items: ItemCounts::default(),
            position: Position::default(),
            miner_points: 0,
            amazonites: 0,
            deaths: Vec::new(),
            amazonite_converted: Vec::new(),
            vip_amazonite_converted: Vec::new(),
            map_created_at: None,
            connection_id: None,
            last_connected_at: None,
        }
    }

    pub fn last_death(&self) -> Option<DateTime<Utc>> {
        self.deaths.iter().max().copied()
    }

    pub fn conversions(&self, log: ConversionLog) -> &[DateTime<Utc>] {
        match log {
            ConversionLog::Standard => &self.amazonite_converted,
            ConversionLog::Vip => &self.vip_amazonite_converted,
        }
    }

    pub fn conversions_mut(&mut self, log: ConversionLog) -> &mut Vec<DateTime<Utc>> {
        match log {
            ConversionLog::Standard => &mut self.amazonite_converted,
            ConversionLog::Vip => &mut self.vip_amazonite_converted,
        }
    }
}

/// Full game snapshot pushed to the client as `player_data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub is_vip: bool,
    pub deaths: usize,
    pub life: i64,
    pub energy: i64,
    pub max_life: i64,
    pub max_energy: i64,
    pub max_lbs: i64,
    pub amz_conversion: i64,
    #[serde(flatten)]
    pub ores: BTreeMap<OreKind, i64>,
    pub position_x: f64,
    pub position_y: f64,
    #[serde(flatten)]
    pub items: BTreeMap<ItemKind, i64>,
    pub should_create_map: bool,
    pub miner_points: i64,
    pub helmet: String,
    pub pickaxe: String,
    pub armour: String,
    pub belt: String,
    pub trinket: String,
    pub jetpack: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relic: Option<String>,
    pub buyed_today: usize,
    pub vip_buyed_today: usize,
    pub amazonites: i64,
    /// Persisted zone maps, each encoded as a JSON array string.
    #[serde(flatten)]
    pub maps: BTreeMap<Zone, String>,
}

impl PlayerSnapshot {
    /// Assemble a snapshot from the joined sources. A missing record yields
    /// baseline values.
    pub fn assemble(
        record: Option<&PlayerRecord>,
        is_vip: bool,
        maps: &[(Zone, Vec<i64>)],
        loadout: &Loadout,
        now: DateTime<Utc>,
    ) -> Self {
        let baseline;
        let record = match record {
            Some(r) => r,
            None => {
                baseline = PlayerRecord::new(PlayerId::new(String::new()));
                &baseline
            },
        };

        let maps = maps
            .iter()
            .map(|(zone, tiles)| {
                let encoded = serde_json::to_string(tiles).unwrap_or_else(|_| "[]".to_string());
                (*zone, encoded)
            })
            .collect();

        Self {
            is_vip,
            deaths: fresh_count(&record.deaths, now),
            life: or_baseline(record.life, COMMON_HEALTH),
            energy: or_baseline(record.energy, COMMON_ENERGY),
            max_life: loadout.max_life,
            max_energy: loadout.max_energy,
            max_lbs: loadout.max_weight,
            amz_conversion: loadout.amz_conversion,
            ores: record.ores.iter().collect(),
            position_x: record.position.x,
            position_y: record.position.y,
            items: record.items.iter().collect(),
            should_create_map: record.map_created_at.is_none_or(|at| is_stale(at, now)),
            miner_points: record.miner_points,
            helmet: loadout.helmet.clone(),
            pickaxe: loadout.pickaxe.clone(),
            armour: loadout.armour.clone(),
            belt: loadout.belt.clone(),
            trinket: loadout.trinket.clone(),
            jetpack: loadout.jetpack.clone(),
            relic: loadout.relic.clone(),
            buyed_today: fresh_count(&record.amazonite_converted, now),
            vip_buyed_today: fresh_count(&record.vip_amazonite_converted, now),
            amazonites: record.amazonites,
            maps,
        }
    }
}

/// A stored zero is reported as the baseline value.
fn or_baseline(value: i64, baseline: i64) -> i64 {
    if value == 0 { baseline } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_uses_common_baseline() {
        let r = PlayerRecord::new(PlayerId::from("0xabc"));
        assert_eq!(r.life, COMMON_HEALTH);
        assert_eq!(r.energy, COMMON_ENERGY);
        assert_eq!(r.position, Position { x: -8.0, y: -1.0 });
        assert!(r.last_death().is_none());
    }

    #[test]
    fn snapshot_reports_baseline_for_zero_vitals() {
        let now = Utc::now();
        let mut r = PlayerRecord::new(PlayerId::from("0xabc"));
        r.life = 0;
        r.energy = 0;
        let snap = PlayerSnapshot::assemble(Some(&r), false, &[], &Loadout::default(), now);
        assert_eq!(snap.life, COMMON_HEALTH);
        assert_eq!(snap.energy, COMMON_ENERGY);

        r.life = -3;
        r.energy = 7;
        let snap = PlayerSnapshot::assemble(Some(&r), false, &[], &Loadout::default(), now);
        assert_eq!(snap.life, -3);
        assert_eq!(snap.energy, 7);
    }

    #[test]
    fn snapshot_field_names() {
        let now = Utc::now();
        let mut r = PlayerRecord::new(PlayerId::from("0xabc"));
        r.ores.set(OreKind::Gold, 3);
        r.items.set(ItemKind::Medkit, 2);
        r.miner_points = 500;
        r.map_created_at = Some(now);
        let maps = vec![(Zone::Z2s1, vec![0, 1, 9])];
        let snap = PlayerSnapshot::assemble(Some(&r), true, &maps, &Loadout::default(), now);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["isVip"], true);
        assert_eq!(json["Gold"], 3);
        assert_eq!(json["Coal"], 0);
        assert_eq!(json["medkit"], 2);
        assert_eq!(json["minerPoints"], 500);
        assert_eq!(json["maxLbs"], 110);
        assert_eq!(json["shouldCreateMap"], false);
        assert_eq!(json["z2s1"], "[0,1,9]");
        assert_eq!(json["positionX"], -8.0);
        assert!(json.get("z1s1").is_none());
        assert!(json.get("relic").is_none());
    }

    #[test]
    fn snapshot_counts_only_todays_entries() {
        let now = Utc::now();
        let yesterday = now - chrono::Duration::days(1);
        let mut r = PlayerRecord::new(PlayerId::from("0xabc"));
        r.deaths = vec![yesterday, now];
        r.amazonite_converted = vec![yesterday, yesterday, now];
        r.vip_amazonite_converted = vec![now, now];
        r.map_created_at = Some(yesterday);
        let snap = PlayerSnapshot::assemble(Some(&r), false, &[], &Loadout::default(), now);
        assert_eq!(snap.deaths, 1);
        assert_eq!(snap.buyed_today, 1);
        assert_eq!(snap.vip_buyed_today, 2);
        assert!(snap.should_create_map);
    }

    #[test]
    fn snapshot_without_record_uses_baseline() {
        let snap =
            PlayerSnapshot::assemble(None, false, &[], &Loadout::default(), Utc::now());
        assert_eq!(snap.life, COMMON_HEALTH);
        assert_eq!(snap.energy, COMMON_ENERGY);
        assert!(snap.should_create_map);
        assert_eq!(snap.ores.len(), OreKind::COUNT);
        assert_eq!(snap.items.len(), ItemKind::COUNT);
    }
}
