//! Tile reveal planning for `energy_update` batches.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::ore::{OreCounts, OreKind};

/// Keep only entries that denote non-negative integer tile indices.
///
/// Clients send indices as JSON numbers; integral floats and digit strings
/// are accepted, everything else is dropped.
pub fn sanitize_indices(raw: &[Value]) -> Vec<usize> {
    raw.iter().filter_map(index_of).collect()
}

fn index_of(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_u64() {
                return usize::try_from(i).ok();
            }
            let f = n.as_f64()?;
            (f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64).then_some(f as usize)
        },
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().ok()
        },
        _ => None,
    }
}

/// Outcome of revealing a set of tiles on one zone map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevealPlan {
    /// Ore collected from revealed ore tiles.
    pub ores: OreCounts,
    /// In-range tile indices to overwrite with 0, ascending and unique.
    pub cleared: Vec<usize>,
}

impl RevealPlan {
    /// Plan the reveal of `indices` against the stored `tiles`. Out-of-range
    /// indices are ignored, a tile revealed twice in one batch is counted once.
    pub fn compute(tiles: &[i64], indices: &[usize]) -> Self {
        let unique: BTreeSet<usize> = indices.iter().copied().filter(|&i| i < tiles.len()).collect();
        let mut plan = Self::default();
        for index in unique {
            if let Some(ore) = OreKind::from_tile(tiles[index]) {
                plan.ores.add(ore, 1);
            }
            plan.cleared.push(index);
        }
        plan
    }

    /// Fold another zone's plan into the ore totals.
    pub fn merge_ores(&mut self, other: &RevealPlan) {
        for (ore, count) in other.ores.iter() {
            self.ores.add(ore, count);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cleared.is_empty()
    }
}
