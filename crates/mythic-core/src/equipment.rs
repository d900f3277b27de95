//! Equipment slots, NFT metadata, and derivation of a player's loadout.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const COMMON_HEALTH: i64 = 45;
pub const COMMON_ENERGY: i64 = 130;
pub const COMMON_WEIGHT: i64 = 110;

/// Equipped-item slots as numbered by the equipment contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentSlot {
    Helmet = 0,
    Pickaxe = 1,
    Armour = 2,
    Jetpack = 3,
    Belt = 4,
    Trinket = 5,
    Relic = 6,
}

impl EquipmentSlot {
    pub fn from_index(index: u8) -> Option<Self> {
        Some(match index {
            0 => Self::Helmet,
            1 => Self::Pickaxe,
            2 => Self::Armour,
            3 => Self::Jetpack,
            4 => Self::Belt,
            5 => Self::Trinket,
            6 => Self::Relic,
            _ => return None,
        })
    }

    /// Metadata collection the slot's tokens are stored under.
    pub fn category(self) -> NftCategory {
        match self {
            Self::Relic => NftCategory::Relics,
            _ => NftCategory::Equipments,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NftCategory {
    Relics,
    Equipments,
    Beta,
}

/// Lookup key of one NFT metadata document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NftKey {
    pub category: NftCategory,
    pub token_id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NftAttribute {
    pub trait_type: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NftMetadata {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub attributes: Vec<NftAttribute>,
}

impl NftMetadata {
    fn attribute(&self, trait_type: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|a| a.trait_type == trait_type)
            .map(|a| &a.value)
    }

    /// Numeric attribute; accepts JSON numbers and numeric strings.
    pub fn number(&self, trait_type: &str) -> Option<i64> {
        match self.attribute(trait_type)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
            _ => None,
        }
    }

    pub fn text(&self, trait_type: &str) -> Option<&str> {
        self.attribute(trait_type)?.as_str()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NftRecord {
    pub key: NftKey,
    pub metadata: NftMetadata,
}

/// Cosmetic names and stat caps derived from the equipped items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loadout {
    pub helmet: String,
    pub pickaxe: String,
    pub armour: String,
    pub jetpack: String,
    pub belt: String,
    pub trinket: String,
    pub relic: Option<String>,
    pub max_life: i64,
    pub max_energy: i64,
    pub max_weight: i64,
    /// Relic bonus applied to amazonite payouts, in percent.
    pub amz_conversion: i64,
}

impl Default for Loadout {
    fn default() -> Self {
        Self {
            helmet: "helmet-common".to_string(),
            pickaxe: "pickaxe-common".to_string(),
            armour: "armour-common".to_string(),
            jetpack: "jetpack-common".to_string(),
            belt: "belt-common".to_string(),
            trinket: "trinket-common".to_string(),
            relic: None,
            max_life: COMMON_HEALTH,
            max_energy: COMMON_ENERGY,
            max_weight: COMMON_WEIGHT,
            amz_conversion: 0,
        }
    }
}

impl Loadout {
    /// Build a loadout from the metadata of equipped tokens. Unknown
    /// categories and unparseable images leave the slot at its default.
    pub fn from_records(records: &[NftRecord]) -> Self {
        let mut loadout = Self::default();
        for record in records {
            match record.key.category {
                NftCategory::Relics => loadout.apply_relic(&record.metadata),
                NftCategory::Equipments => loadout.apply_equipment(&record.metadata),
                NftCategory::Beta => {},
            }
        }
        loadout
    }

    fn apply_relic(&mut self, metadata: &NftMetadata) {
        if let Some(name) = image_stem(&metadata.image, "/relics/") {
            self.relic = Some(name.to_string());
        }
        if let Some(bonus) = metadata.number("Amazonite Conversion") {
            self.amz_conversion = bonus;
        }
    }

    fn apply_equipment(&mut self, metadata: &NftMetadata) {
        let Some(category) = metadata.text("Category").map(str::to_lowercase) else {
            return;
        };
        let Some(stem) = image_stem(&metadata.image, &format!("/equipments/{category}s/")) else {
            return;
        };
        let name = format!("{category}-{}", strip_variant(stem));

        match category.as_str() {
            "helmet" => {
                self.helmet = name;
                if let Some(v) = metadata.number("Health") {
                    self.max_life = v;
                }
            },
            "jetpack" => {
                self.jetpack = name;
                if let Some(v) = metadata.number("Energy") {
                    self.max_energy = v;
                }
            },
            "belt" => {
                self.belt = name;
                if let Some(v) = metadata.number("Max Weight") {
                    self.max_weight = v;
                }
            },
            "pickaxe" => self.pickaxe = name,
            "armour" => self.armour = name,
            "trinket" => self.trinket = name,
            _ => {},
        }
    }
}

/// File stem of a `.png` image located under `dir` in `image`.
fn image_stem<'a>(image: &'a str, dir: &str) -> Option<&'a str> {
    let start = image.find(dir)? + dir.len();
    let rest = &image[start..];
    let stem = rest.strip_suffix(".png").or_else(|| rest.split_once(".png").map(|(s, _)| s))?;
    (!stem.is_empty() && !stem.contains('/')).then_some(stem)
}

/// Drop the rarity variant suffix (`-a`, `-b`, `-c`, `-s`) from an image stem.
fn strip_variant(stem: &str) -> &str {
    for suffix in ["-a", "-b", "-c", "-s"] {
        if let Some(base) = stem.strip_suffix(suffix) {
            return base;
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(category: NftCategory, token_id: u64, metadata: Value) -> NftRecord {
        NftRecord {
            key: NftKey { category, token_id },
            metadata: serde_json::from_value(metadata).unwrap(),
        }
    }

    #[test]
    fn empty_loadout_is_common() {
        let loadout = Loadout::from_records(&[]);
        assert_eq!(loadout, Loadout::default());
        assert_eq!(loadout.max_life, COMMON_HEALTH);
        assert_eq!(loadout.max_energy, COMMON_ENERGY);
        assert_eq!(loadout.max_weight, COMMON_WEIGHT);
        assert_eq!(loadout.helmet, "helmet-common");
        assert!(loadout.relic.is_none());
    }

    #[test]
    fn helmet_sets_name_and_max_life() {
        let helmet = record(
            NftCategory::Equipments,
            12,
            json!({
                "image": "https://cdn.example/equipments/helmets/miner-rare-b.png",
                "attributes": [
                    {"trait_type": "Category", "value": "Helmet"},
                    {"trait_type": "Health", "value": 80}
                ]
            }),
        );
        let loadout = Loadout::from_records(&[helmet]);
        assert_eq!(loadout.helmet, "helmet-miner-rare");
        assert_eq!(loadout.max_life, 80);
        assert_eq!(loadout.max_energy, COMMON_ENERGY);
    }

    #[test]
    fn jetpack_belt_and_cosmetics() {
        let records = vec![
            record(
                NftCategory::Equipments,
                1,
                json!({
                    "image": "/equipments/jetpacks/turbo-s.png",
                    "attributes": [
                        {"trait_type": "Category", "value": "JETPACK"},
                        {"trait_type": "Energy", "value": "210"}
                    ]
                }),
            ),
            record(
                NftCategory::Equipments,
                2,
                json!({
                    "image": "/equipments/belts/leather.png",
                    "attributes": [
                        {"trait_type": "Category", "value": "belt"},
                        {"trait_type": "Max Weight", "value": 150}
                    ]
                }),
            ),
            record(
                NftCategory::Equipments,
                3,
                json!({
                    "image": "/equipments/pickaxes/diamond-a.png",
                    "attributes": [{"trait_type": "Category", "value": "Pickaxe"}]
                }),
            ),
        ];
        let loadout = Loadout::from_records(&records);
        assert_eq!(loadout.jetpack, "jetpack-turbo");
        assert_eq!(loadout.max_energy, 210);
        assert_eq!(loadout.belt, "belt-leather");
        assert_eq!(loadout.max_weight, 150);
        assert_eq!(loadout.pickaxe, "pickaxe-diamond");
        assert_eq!(loadout.armour, "armour-common");
    }

    #[test]
    fn relic_sets_name_and_bonus() {
        let relic = record(
            NftCategory::Relics,
            7,
            json!({
                "image": "https://cdn.example/relics/golden-idol.png",
                "attributes": [{"trait_type": "Amazonite Conversion", "value": 15}]
            }),
        );
        let loadout = Loadout::from_records(&[relic]);
        assert_eq!(loadout.relic.as_deref(), Some("golden-idol"));
        assert_eq!(loadout.amz_conversion, 15);
    }

    #[test]
    fn mismatched_image_path_keeps_default() {
        let helmet = record(
            NftCategory::Equipments,
            4,
            json!({
                "image": "/equipments/armours/plate.png",
                "attributes": [
                    {"trait_type": "Category", "value": "Helmet"},
                    {"trait_type": "Health", "value": 99}
                ]
            }),
        );
        let loadout = Loadout::from_records(&[helmet]);
        assert_eq!(loadout.helmet, "helmet-common");
        assert_eq!(loadout.max_life, COMMON_HEALTH);
    }

    #[test]
    fn slot_indices() {
        assert_eq!(EquipmentSlot::from_index(0), Some(EquipmentSlot::Helmet));
        assert_eq!(EquipmentSlot::from_index(6), Some(EquipmentSlot::Relic));
        assert_eq!(EquipmentSlot::from_index(7), None);
        assert_eq!(EquipmentSlot::Relic.category(), NftCategory::Relics);
        assert_eq!(EquipmentSlot::Belt.category(), NftCategory::Equipments);
    }

    #[test]
    fn variant_suffix_only_stripped_once() {
        assert_eq!(strip_variant("axe-a"), "axe");
        assert_eq!(strip_variant("axe-s-s"), "axe-s");
        assert_eq!(strip_variant("glass"), "glass");
    }
}
