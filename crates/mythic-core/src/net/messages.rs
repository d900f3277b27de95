use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::player::PlayerSnapshot;
use crate::zone::Zone;

/// Client -> server message type discriminator, as carried in the
/// envelope's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    PlayerData,
    LifeUpdate,
    EnergyUpdate,
    DeathUpdate,
    TilemapCreate,
    SaveTilemap,
    MinedRock,
    SellOres,
    HellyHeal,
    HellyRestoreEnergy,
    DeleteOre,
    BuyItem,
    UseTeleport,
    UseHeal,
    UseEnergy,
    UseAntiFire,
    UseBomb,
    ExplosiveTile,
    ConvertAmazonite,
    Ping,
    Pong,
}

impl MessageType {
    pub const ALL: [MessageType; 21] = [
        MessageType::PlayerData,
        MessageType::LifeUpdate,
        MessageType::EnergyUpdate,
        MessageType::DeathUpdate,
        MessageType::TilemapCreate,
        MessageType::SaveTilemap,
        MessageType::MinedRock,
        MessageType::SellOres,
        MessageType::HellyHeal,
        MessageType::HellyRestoreEnergy,
        MessageType::DeleteOre,
        MessageType::BuyItem,
        MessageType::UseTeleport,
        MessageType::UseHeal,
        MessageType::UseEnergy,
        MessageType::UseAntiFire,
        MessageType::UseBomb,
        MessageType::ExplosiveTile,
        MessageType::ConvertAmazonite,
        MessageType::Ping,
        MessageType::Pong,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlayerData => "player_data",
            Self::LifeUpdate => "life_update",
            Self::EnergyUpdate => "energy_update",
            Self::DeathUpdate => "death_update",
            Self::TilemapCreate => "tilemap_create",
            Self::SaveTilemap => "save_tilemap",
            Self::MinedRock => "mined_rock",
            Self::SellOres => "sell_ores",
            Self::HellyHeal => "helly_heal",
            Self::HellyRestoreEnergy => "helly_restore_energy",
            Self::DeleteOre => "delete_ore",
            Self::BuyItem => "buy_item",
            Self::UseTeleport => "use_teleport",
            Self::UseHeal => "use_heal",
            Self::UseEnergy => "use_energy",
            Self::UseAntiFire => "use_anti_fire",
            Self::UseBomb => "use_bomb",
            Self::ExplosiveTile => "explosive_tile",
            Self::ConvertAmazonite => "convert_amazonite",
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

// ============================================================================
// Client -> Server payloads
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmptyMsg {}

/// Life lost since the last report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeUpdateMsg {
    pub life: f64,
}

/// Periodic vitals report, optionally carrying revealed tile indices per zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyUpdateMsg {
    pub energy: f64,
    pub life: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z1s1: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z1s2: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z2s1: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z2s2: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z3s1: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z3s2: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z4s1: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z4s2: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z5s1: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z5s2: Option<Vec<Value>>,
}

impl EnergyUpdateMsg {
    /// Non-empty revealed-index lists, keyed by zone.
    pub fn revealed(&self) -> Vec<(Zone, &[Value])> {
        [
            (Zone::Z1s1, &self.z1s1),
            (Zone::Z1s2, &self.z1s2),
            (Zone::Z2s1, &self.z2s1),
            (Zone::Z2s2, &self.z2s2),
            (Zone::Z3s1, &self.z3s1),
            (Zone::Z3s2, &self.z3s2),
            (Zone::Z4s1, &self.z4s1),
            (Zone::Z4s2, &self.z4s2),
            (Zone::Z5s1, &self.z5s1),
            (Zone::Z5s2, &self.z5s2),
        ]
        .into_iter()
        .filter_map(|(zone, list)| match list {
            Some(list) if !list.is_empty() => Some((zone, list.as_slice())),
            _ => None,
        })
        .collect()
    }
}

/// Freshly generated zone map. `tilemap` is normally a JSON array encoded
/// as a string; a bare array is accepted too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilemapCreateMsg {
    pub name: String,
    pub tilemap: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveTilemapMsg {
    pub tile_index: Value,
    pub tilemap_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinedRockMsg {
    pub rock: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HellyHealMsg {
    pub miner_points: f64,
    pub current_life: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HellyRestoreEnergyMsg {
    pub miner_points: f64,
    pub current_energy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteOreMsg {
    pub ore: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyItemMsg {
    pub item: String,
    pub miner_points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseTeleportMsg {
    pub position_x: f64,
    pub position_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseHealMsg {
    pub current_life: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseEnergyMsg {
    pub current_energy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertAmazoniteMsg {
    pub button_index: f64,
    #[serde(default)]
    pub is_vip: bool,
    /// Opaque correlation id echoed back on success.
    #[serde(default)]
    pub request_id: Value,
}

/// A decoded client message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    PlayerData,
    LifeUpdate(LifeUpdateMsg),
    EnergyUpdate(Box<EnergyUpdateMsg>),
    DeathUpdate,
    TilemapCreate(TilemapCreateMsg),
    SaveTilemap(SaveTilemapMsg),
    MinedRock(MinedRockMsg),
    SellOres,
    HellyHeal(HellyHealMsg),
    HellyRestoreEnergy(HellyRestoreEnergyMsg),
    DeleteOre(DeleteOreMsg),
    BuyItem(BuyItemMsg),
    UseTeleport(UseTeleportMsg),
    UseHeal(UseHealMsg),
    UseEnergy(UseEnergyMsg),
    UseAntiFire,
    UseBomb,
    ExplosiveTile,
    ConvertAmazonite(ConvertAmazoniteMsg),
    Ping,
    Pong,
}

impl ClientMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::PlayerData => MessageType::PlayerData,
            Self::LifeUpdate(_) => MessageType::LifeUpdate,
            Self::EnergyUpdate(_) => MessageType::EnergyUpdate,
            Self::DeathUpdate => MessageType::DeathUpdate,
            Self::TilemapCreate(_) => MessageType::TilemapCreate,
            Self::SaveTilemap(_) => MessageType::SaveTilemap,
            Self::MinedRock(_) => MessageType::MinedRock,
            Self::SellOres => MessageType::SellOres,
            Self::HellyHeal(_) => MessageType::HellyHeal,
            Self::HellyRestoreEnergy(_) => MessageType::HellyRestoreEnergy,
            Self::DeleteOre(_) => MessageType::DeleteOre,
            Self::BuyItem(_) => MessageType::BuyItem,
            Self::UseTeleport(_) => MessageType::UseTeleport,
            Self::UseHeal(_) => MessageType::UseHeal,
            Self::UseEnergy(_) => MessageType::UseEnergy,
            Self::UseAntiFire => MessageType::UseAntiFire,
            Self::UseBomb => MessageType::UseBomb,
            Self::ExplosiveTile => MessageType::ExplosiveTile,
            Self::ConvertAmazonite(_) => MessageType::ConvertAmazonite,
            Self::Ping => MessageType::Ping,
            Self::Pong => MessageType::Pong,
        }
    }
}

// ============================================================================
// Server -> Client payloads
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Success,
    Error,
    DeathTooRecent,
    Rejected,
}

/// Outcome of a state-changing action, e.g. `{"message":"success"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStatus {
    pub message: StatusKind,
    /// Milliseconds until the death cooldown expires.
    #[serde(rename = "timeToWait", default, skip_serializing_if = "Option::is_none")]
    pub time_to_wait: Option<u64>,
}

impl ActionStatus {
    pub const SUCCESS: Self = Self::of(StatusKind::Success);
    pub const ERROR: Self = Self::of(StatusKind::Error);
    pub const REJECTED: Self = Self::of(StatusKind::Rejected);

    const fn of(message: StatusKind) -> Self {
        Self {
            message,
            time_to_wait: None,
        }
    }

    pub fn death_too_recent(time_to_wait_ms: u64) -> Self {
        Self {
            message: StatusKind::DeathTooRecent,
            time_to_wait: Some(time_to_wait_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampMsg {
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMsg {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmazoniteSuccessMsg {
    pub request_id: Value,
}

/// Server -> client messages, serialized as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    PlayerData(Box<PlayerSnapshot>),
    LifeUpdate(ActionStatus),
    EnergyUpdate(ActionStatus),
    DeathUpdate(ActionStatus),
    TilemapCreate(ActionStatus),
    SaveTilemap(ActionStatus),
    SellOres(ActionStatus),
    BuyItem(ActionStatus),
    AmazoniteSuccess(AmazoniteSuccessMsg),
    Ping(TimestampMsg),
    Pong(TimestampMsg),
    Error(ErrorMsg),
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorMsg {
            message: message.into(),
        })
    }
}
