// Declarative rate-limit policy: per-tier default capacities plus
// (tier, action) overrides parsed from the `rateLimits` JSON document.

use super::tier::{Capacity, Tier};
use serde::Deserialize;
use std::fmt;

/// Capacity used for a tier that has no entry in the default list.
///
/// Unlimited, so throttling is opt-in per tier.
pub const BASELINE_CAPACITY: Capacity = Capacity::Unlimited;

/// One override entry: every action listed gets `limit` at `tier`.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRule {
    pub tier: Tier,
    pub limit: Capacity,
    pub actions: Vec<String>,
}

impl ActionRule {
    fn matches(&self, tier: Tier, action: &str) -> bool {
        self.tier == tier && self.actions.iter().any(|a| a == action)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPolicy {
    #[serde(default)]
    rate_limits: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRule {
    tier: u32,
    limit_per_hour: i64,
    #[serde(default)]
    actions: Vec<String>,
}

/// Ordered per-tier default capacities, indexed by tier.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultCapacities {
    tiers: Vec<Capacity>,
    baseline: Capacity,
}

impl DefaultCapacities {
    pub fn new(tiers: Vec<Capacity>) -> Self {
        Self {
            tiers,
            baseline: BASELINE_CAPACITY,
        }
    }

    /// Parse a comma-separated list such as `"30,60,120,-1"`.
    ///
    /// Every entry must be a non-negative integer or the NO_LIMIT sentinel.
    pub fn parse_csv(csv: &str) -> Result<Self, PolicyError> {
        if csv.trim().is_empty() {
            return Ok(Self::new(Vec::new()));
        }
        let tiers = csv
            .split(',')
            .enumerate()
            .map(|(index, raw)| {
                let raw = raw.trim();
                raw.parse::<i64>()
                    .ok()
                    .and_then(Capacity::from_raw)
                    .ok_or_else(|| PolicyError::InvalidDefaultCapacity {
                        index,
                        value: raw.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(tiers))
    }

    pub fn with_baseline(mut self, baseline: Capacity) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn get(&self, tier: Tier) -> Capacity {
        self.tiers.get(tier.index()).copied().unwrap_or(self.baseline)
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

/// Immutable capacity lookup table. Built once per (re)load.
#[derive(Debug, Clone)]
pub struct PolicyStore {
    defaults: DefaultCapacities,
    rules: Vec<ActionRule>,
}

impl PolicyStore {
    /// Build from raw policy JSON. Blank text means no overrides.
    pub fn from_json(policy_json: &str, defaults: DefaultCapacities) -> Result<Self, PolicyError> {
        if policy_json.trim().is_empty() {
            return Ok(Self::defaults_only(defaults));
        }

        let raw: RawPolicy = serde_json::from_str(policy_json)
            .map_err(|e| PolicyError::MalformedPolicy(e.to_string()))?;

        let rules = raw
            .rate_limits
            .into_iter()
            .map(|r| -> Result<ActionRule, PolicyError> {
                let limit = Capacity::from_raw(r.limit_per_hour).ok_or(PolicyError::InvalidLimit {
                    tier: r.tier,
                    value: r.limit_per_hour,
                })?;
                Ok(ActionRule {
                    tier: Tier(r.tier),
                    limit,
                    actions: r.actions,
                })
            })
            .collect::<Result<Vec<_>, PolicyError>>()?;

        Ok(Self { defaults, rules })
    }

    /// Store with tier defaults only and no override rules.
    pub fn defaults_only(defaults: DefaultCapacities) -> Self {
        Self {
            defaults,
            rules: Vec::new(),
        }
    }

    /// First rule matching (tier, action) wins; otherwise the tier default.
    pub fn capacity_for(&self, tier: Tier, action: &str) -> Capacity {
        self.rules
            .iter()
            .find(|rule| rule.matches(tier, action))
            .map(|rule| rule.limit)
            .unwrap_or_else(|| self.defaults.get(tier))
    }

    pub fn rules(&self) -> &[ActionRule] {
        &self.rules
    }

    pub fn defaults(&self) -> &DefaultCapacities {
        &self.defaults
    }
}

/// Policy load errors
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyError {
    /// Policy text is not valid `rateLimits` JSON
    MalformedPolicy(String),
    /// A rule carries a negative limit other than the NO_LIMIT sentinel
    InvalidLimit { tier: u32, value: i64 },
    /// A default-capacity entry is non-numeric or negative
    InvalidDefaultCapacity { index: usize, value: String },
    /// Baseline capacity is negative and not the NO_LIMIT sentinel
    InvalidBaseline(i64),
    /// Policy file could not be read
    PolicyFile(String),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::MalformedPolicy(e) => write!(f, "malformed rate limit policy: {}", e),
            PolicyError::InvalidLimit { tier, value } => {
                write!(f, "invalid limitPerHour {} for tier {}", value, tier)
            }
            PolicyError::InvalidDefaultCapacity { index, value } => {
                write!(f, "invalid default capacity '{}' for tier {}", value, index)
            }
            PolicyError::InvalidBaseline(v) => write!(f, "invalid baseline capacity {}", v),
            PolicyError::PolicyFile(e) => write!(f, "failed to read policy file: {}", e),
        }
    }
}

impl std::error::Error for PolicyError {}
