use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The nine ore kinds, ordered by rarity. The discriminant order matches
/// the tile codes written into zone maps (Coal = 1 .. Crownite = 9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OreKind {
    Coal,
    Copper,
    Silver,
    Gold,
    Emerald,
    Sapphire,
    Mythril,
    Adamantium,
    Crownite,
}

impl OreKind {
    pub const COUNT: usize = 9;

    pub const ALL: [OreKind; Self::COUNT] = [
        OreKind::Coal,
        OreKind::Copper,
        OreKind::Silver,
        OreKind::Gold,
        OreKind::Emerald,
        OreKind::Sapphire,
        OreKind::Mythril,
        OreKind::Adamantium,
        OreKind::Crownite,
    ];

    /// Map a zone-map tile code to the ore it holds. Codes outside 1..=9
    /// are terrain, not ore.
    pub fn from_tile(code: i64) -> Option<Self> {
        if (1..=Self::COUNT as i64).contains(&code) {
            Some(Self::ALL[(code - 1) as usize])
        } else {
            None
        }
    }

    pub fn tile_code(self) -> i64 {
        self.index() as i64 + 1
    }

    /// Sale price of one unit in miner points.
    pub fn price(self) -> i64 {
        match self {
            Self::Coal => 60,
            Self::Copper => 100,
            Self::Silver => 200,
            Self::Gold => 400,
            Self::Emerald => 1_000,
            Self::Sapphire => 3_200,
            Self::Mythril => 9_000,
            Self::Adamantium => 21_000,
            Self::Crownite => 99_999,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Coal => "Coal",
            Self::Copper => "Copper",
            Self::Silver => "Silver",
            Self::Gold => "Gold",
            Self::Emerald => "Emerald",
            Self::Sapphire => "Sapphire",
            Self::Mythril => "Mythril",
            Self::Adamantium => "Adamantium",
            Self::Crownite => "Crownite",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for OreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ore| ore.name() == s)
            .ok_or_else(|| format!("unknown ore: {s}"))
    }
}

/// Per-ore inventory counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OreCounts([i64; OreKind::COUNT]);

impl OreCounts {
    pub fn get(&self, ore: OreKind) -> i64 {
        self.0[ore.index()]
    }

    pub fn set(&mut self, ore: OreKind, value: i64) {
        self.0[ore.index()] = value;
    }

    pub fn add(&mut self, ore: OreKind, delta: i64) {
        self.0[ore.index()] += delta;
    }

    pub fn slot_mut(&mut self, ore: OreKind) -> &mut i64 {
        &mut self.0[ore.index()]
    }

    pub fn clear(&mut self) {
        self.0 = [0; OreKind::COUNT];
    }

    pub fn iter(&self) -> impl Iterator<Item = (OreKind, i64)> + '_ {
        OreKind::ALL.into_iter().map(|ore| (ore, self.get(ore)))
    }

    /// Total value of the inventory at the fixed sale prices.
    /// Points earned by selling every ore, or `None` if the total overflows.
    pub fn sale_value(&self) -> Option<i64> {
        self.iter().try_fold(0i64, |acc, (ore, count)| {
            count.checked_mul(ore.price()).and_then(|v| acc.checked_add(v))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&c| c == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_codes_map_in_rarity_order() {
        assert_eq!(OreKind::from_tile(1), Some(OreKind::Coal));
        assert_eq!(OreKind::from_tile(5), Some(OreKind::Emerald));
        assert_eq!(OreKind::from_tile(9), Some(OreKind::Crownite));
        assert_eq!(OreKind::from_tile(0), None);
        assert_eq!(OreKind::from_tile(10), None);
        assert_eq!(OreKind::from_tile(-3), None);
        for ore in OreKind::ALL {
            assert_eq!(OreKind::from_tile(ore.tile_code()), Some(ore));
        }
    }

    #[test]
    fn parse_names() {
        assert_eq!("Mythril".parse::<OreKind>().unwrap(), OreKind::Mythril);
        assert!("mythril".parse::<OreKind>().is_err());
        assert!("Diamond".parse::<OreKind>().is_err());
    }

    #[test]
    fn serde_uses_display_names() {
        let json = serde_json::to_string(&OreKind::Adamantium).unwrap();
        assert_eq!(json, "\"Adamantium\"");
    }

    #[test]
    fn sale_value_uses_price_table() {
        let mut ores = OreCounts::default();
        ores.set(OreKind::Coal, 3);
        ores.set(OreKind::Crownite, 1);
        assert_eq!(ores.sale_value(), Some(3 * 60 + 99_999));

        ores.clear();
        assert!(ores.is_empty());
        assert_eq!(ores.sale_value(), Some(0));

        ores.set(OreKind::Crownite, i64::MAX);
        assert_eq!(ores.sale_value(), None);
    }

    #[test]
    fn add_accumulates() {
        let mut ores = OreCounts::default();
        ores.add(OreKind::Gold, 2);
        ores.add(OreKind::Gold, 5);
        assert_eq!(ores.get(OreKind::Gold), 7);
        assert_eq!(ores.get(OreKind::Silver), 0);
    }
}
