use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Consumable items a miner can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    EnergyDrink,
    TeleportPill,
    FireResistancePotion,
    Bomb,
    Medkit,
}

impl ItemKind {
    pub const COUNT: usize = 5;

    pub const ALL: [ItemKind; Self::COUNT] = [
        ItemKind::EnergyDrink,
        ItemKind::TeleportPill,
        ItemKind::FireResistancePotion,
        ItemKind::Bomb,
        ItemKind::Medkit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::EnergyDrink => "energyDrink",
            Self::TeleportPill => "teleportPill",
            Self::FireResistancePotion => "fireResistancePotion",
            Self::Bomb => "bomb",
            Self::Medkit => "medkit",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|item| item.name() == s)
            .ok_or_else(|| format!("unknown item: {s}"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemCounts([i64; ItemKind::COUNT]);

impl ItemCounts {
    pub fn get(&self, item: ItemKind) -> i64 {
        self.0[item as usize]
    }

    pub fn set(&mut self, item: ItemKind, value: i64) {
        self.0[item as usize] = value;
    }

    pub fn add(&mut self, item: ItemKind, delta: i64) {
        self.0[item as usize] += delta;
    }

    pub fn slot_mut(&mut self, item: ItemKind) -> &mut i64 {
        &mut self.0[item as usize]
    }

    pub fn clear(&mut self) {
        self.0 = [0; ItemKind::COUNT];
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemKind, i64)> + '_ {
        ItemKind::ALL.into_iter().map(|item| (item, self.get(item)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for item in ItemKind::ALL {
            assert_eq!(item.name().parse::<ItemKind>().unwrap(), item);
        }
        assert!("Medkit".parse::<ItemKind>().is_err());
    }

    #[test]
    fn serde_names_match_wire_names() {
        assert_eq!(
            serde_json::to_string(&ItemKind::FireResistancePotion).unwrap(),
            "\"fireResistancePotion\""
        );
    }

    #[test]
    fn counts_track_each_item_independently() {
        let mut items = ItemCounts::default();
        items.add(ItemKind::Bomb, 2);
        items.set(ItemKind::Medkit, 4);
        assert_eq!(items.get(ItemKind::Bomb), 2);
        assert_eq!(items.get(ItemKind::Medkit), 4);
        assert_eq!(items.get(ItemKind::EnergyDrink), 0);
        items.clear();
        assert!(items.iter().all(|(_, n)| n == 0));
    }
}
