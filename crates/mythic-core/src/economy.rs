//! Amazonite conversion ladder.
//!
//! Each UTC day a player may climb the ladder one rung at a time: rung `i`
//! costs `1000 * 2^i` miner points and pays a fixed amount of amazonites,
//! boosted by the equipped relic's conversion bonus.

use serde::{Deserialize, Serialize};

pub const LADDER_LEN: usize = 10;

const PRICES: [i64; LADDER_LEN] = [
    1_000, 2_000, 4_000, 8_000, 16_000, 32_000, 64_000, 128_000, 256_000, 512_000,
];

const PAYOUTS: [i64; LADDER_LEN] = [4, 4, 4, 6, 6, 8, 8, 10, 10, 15];

/// One rung of the conversion ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionTier {
    pub index: usize,
    pub price: i64,
    pub payout: i64,
}

impl ConversionTier {
    pub fn get(index: usize) -> Option<Self> {
        Some(Self {
            index,
            price: *PRICES.get(index)?,
            payout: PAYOUTS[index],
        })
    }

    /// Payout after applying a relic bonus in percent, rounded down.
    pub fn boosted_payout(&self, bonus_percent: i64) -> i64 {
        self.payout * (bonus_percent.max(0) + 100) / 100
    }
}

/// Which daily conversion log a conversion is recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionLog {
    Standard,
    Vip,
}

impl ConversionLog {
    pub fn for_vip(is_vip: bool) -> Self {
        if is_vip { Self::Vip } else { Self::Standard }
    }
}
