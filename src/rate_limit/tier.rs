use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer written in configuration to mark a tier (or rule) as never throttled.
pub const NO_LIMIT: i64 = -1;

/// Quota class index assigned to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tier(pub u32);

impl Tier {
    /// Tier used for guests and users that never had one assigned.
    pub const GUEST: Tier = Tier(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.0)
    }
}

/// Hourly quota resolved for a (tier, action) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// At most this many admissions per hour.
    Limited(u64),
    /// Never throttled; no bucket is ever created.
    Unlimited,
}

impl Capacity {
    /// Interpret a raw configured integer.
    ///
    /// Returns `None` for negative values other than [`NO_LIMIT`].
    pub fn from_raw(value: i64) -> Option<Self> {
        match value {
            NO_LIMIT => Some(Capacity::Unlimited),
            v if v >= 0 => Some(Capacity::Limited(v as u64)),
            _ => None,
        }
    }

    pub fn is_unlimited(self) -> bool {
        matches!(self, Capacity::Unlimited)
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Limited(n) => write!(f, "{}/hour", n),
            Capacity::Unlimited => write!(f, "unlimited"),
        }
    }
}
