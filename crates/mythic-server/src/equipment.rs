//! Equipped-item lookup and loadout resolution.

use async_trait::async_trait;

use mythic_core::equipment::{EquipmentSlot, Loadout, NftKey};
use mythic_core::player::PlayerId;

use crate::config::EquipmentConfig;
use crate::store::PlayerStore;

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// A token occupying one equipment slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquippedToken {
    pub slot: EquipmentSlot,
    pub contract: String,
    pub token_id: u64,
}

impl EquippedToken {
    /// Empty slots are reported as the zero address with token id 0. Token 0
    /// on a real contract is a valid item.
    pub fn is_empty(&self) -> bool {
        self.token_id == 0 && self.contract.eq_ignore_ascii_case(ZERO_ADDRESS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentError(pub String);

impl std::fmt::Display for EquipmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "equipment lookup failed: {}", self.0)
    }
}

impl std::error::Error for EquipmentError {}

/// Source of truth for what a player has equipped.
#[async_trait]
pub trait EquipmentLookup: Send + Sync {
    async fn equipped(&self, player: &PlayerId) -> Result<Vec<EquippedToken>, EquipmentError>;
}

/// Serves the same configured loadout to every player.
#[derive(Debug, Clone, Default)]
pub struct StaticLoadout {
    tokens: Vec<EquippedToken>,
}

impl StaticLoadout {
    pub fn new(tokens: Vec<EquippedToken>) -> Self {
        Self { tokens }
    }

    pub fn from_config(config: &EquipmentConfig) -> Self {
        Self::new(
            config
                .loadout
                .iter()
                .map(|slot| EquippedToken {
                    slot: slot.slot,
                    contract: slot.contract.clone(),
                    token_id: slot.token_id,
                })
                .collect(),
        )
    }
}

#[async_trait]
impl EquipmentLookup for StaticLoadout {
    async fn equipped(&self, _player: &PlayerId) -> Result<Vec<EquippedToken>, EquipmentError> {
        Ok(self.tokens.clone())
    }
}

/// Resolve the player's loadout, joining equipped tokens with their metadata.
/// Lookup failures fall back to the common loadout.
pub async fn resolve_loadout(
    equipment: &dyn EquipmentLookup,
    store: &dyn PlayerStore,
    player: &PlayerId,
    token_id_offset: u64,
) -> Loadout {
    let tokens = match equipment.equipped(player).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!(player_id = %player, error = %e, "Equipment lookup failed, using common loadout");
            return Loadout::default();
        },
    };

    let keys: Vec<NftKey> = tokens
        .iter()
        .filter(|t| !t.is_empty())
        .map(|t| NftKey {
            category: t.slot.category(),
            token_id: t.token_id.saturating_add(token_id_offset),
        })
        .collect();
    if keys.is_empty() {
        return Loadout::default();
    }

    match store.nft_metadata(&keys).await {
        Ok(records) => Loadout::from_records(&records),
        Err(e) => {
            tracing::warn!(player_id = %player, error = %e, "NFT metadata lookup failed, using common loadout");
            Loadout::default()
        },
    }
}
