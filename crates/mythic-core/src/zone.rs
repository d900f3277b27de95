use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Map zones: five regions with two sub-zones each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Z1s1,
    Z1s2,
    Z2s1,
    Z2s2,
    Z3s1,
    Z3s2,
    Z4s1,
    Z4s2,
    Z5s1,
    Z5s2,
}

impl Zone {
    pub const ALL: [Zone; 10] = [
        Zone::Z1s1,
        Zone::Z1s2,
        Zone::Z2s1,
        Zone::Z2s2,
        Zone::Z3s1,
        Zone::Z3s2,
        Zone::Z4s1,
        Zone::Z4s2,
        Zone::Z5s1,
        Zone::Z5s2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Z1s1 => "z1s1",
            Self::Z1s2 => "z1s2",
            Self::Z2s1 => "z2s1",
            Self::Z2s2 => "z2s2",
            Self::Z3s1 => "z3s1",
            Self::Z3s2 => "z3s2",
            Self::Z4s1 => "z4s1",
            Self::Z4s2 => "z4s2",
            Self::Z5s1 => "z5s1",
            Self::Z5s2 => "z5s2",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|zone| zone.as_str() == s)
            .ok_or_else(|| format!("unknown zone: {s}"))
    }
}
