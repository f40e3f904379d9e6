pub mod env;

use crate::rate_limit::{Capacity, DefaultCapacities, PolicyError, PolicyStore, NO_LIMIT};
use serde::Deserialize;
use std::path::PathBuf;

/// Complete limiter configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimiterConfig {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Rate limit configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Master switch; when false every check is admitted
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Per-tier hourly capacities as CSV, e.g. "30,60,120,-1" (-1 = no limit)
    #[serde(default)]
    pub default_capacities: String,
    /// Capacity for tiers past the end of `default_capacities`
    #[serde(default = "default_baseline_capacity")]
    pub baseline_capacity: i64,
    /// Inline `rateLimits` policy document; takes precedence over `policy_file`
    #[serde(default)]
    pub policy_json: Option<String>,
    #[serde(default)]
    pub policy_file: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

fn default_baseline_capacity() -> i64 {
    NO_LIMIT
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            default_capacities: String::new(),
            baseline_capacity: default_baseline_capacity(),
            policy_json: None,
            policy_file: None,
        }
    }
}

impl RateLimitConfig {
    pub fn default_capacities(&self) -> Result<DefaultCapacities, PolicyError> {
        let baseline = Capacity::from_raw(self.baseline_capacity)
            .ok_or(PolicyError::InvalidBaseline(self.baseline_capacity))?;
        Ok(DefaultCapacities::parse_csv(&self.default_capacities)?.with_baseline(baseline))
    }

    /// Raw policy text: inline JSON, else the policy file, else empty.
    pub fn policy_text(&self) -> Result<String, PolicyError> {
        if let Some(json) = &self.policy_json {
            return Ok(json.clone());
        }
        match &self.policy_file {
            Some(path) => std::fs::read_to_string(path)
                .map_err(|e| PolicyError::PolicyFile(format!("{}: {}", path.display(), e))),
            None => Ok(String::new()),
        }
    }

    /// Parse defaults and policy into a store, failing on any malformed input.
    pub fn build_policy(&self) -> Result<PolicyStore, PolicyError> {
        let defaults = self.default_capacities()?;
        PolicyStore::from_json(&self.policy_text()?, defaults)
    }
}

/// Load configuration from TOML file, then apply environment overrides
pub fn load_config(path: &str) -> Result<LimiterConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let mut config: LimiterConfig = toml::from_str(&contents)?;
    config.rate_limit.apply_env();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::Tier;

    #[test]
    fn test_default_config() {
        let config = LimiterConfig::default();
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.baseline_capacity, NO_LIMIT);
        assert!(config.rate_limit.policy_json.is_none());

        let store = config.rate_limit.build_policy().unwrap();
        assert!(store.rules().is_empty());
        assert_eq!(store.capacity_for(Tier(0), "Anything"), Capacity::Unlimited);
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [rate_limit]
            enabled = false
            default_capacities = "30,60,120,-1"
            baseline_capacity = 10
            policy_json = '{"rateLimits": [{"tier": 0, "limitPerHour": 1, "actions": ["PublishDatasetCommand"]}]}'
        "#;

        let config: LimiterConfig = toml::from_str(toml).unwrap();
        assert!(!config.rate_limit.enabled);

        let store = config.rate_limit.build_policy().unwrap();
        assert_eq!(store.capacity_for(Tier(0), "PublishDatasetCommand"), Capacity::Limited(1));
        assert_eq!(store.capacity_for(Tier(2), "Other"), Capacity::Limited(120));
        assert_eq!(store.capacity_for(Tier(7), "Other"), Capacity::Limited(10));
    }

    #[test]
    fn test_partial_config() {
        let config: LimiterConfig = toml::from_str("").unwrap();
        assert!(config.rate_limit.enabled);

        let toml = r#"
            [rate_limit]
            default_capacities = "5"
        "#;
        let config: LimiterConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.rate_limit.baseline_capacity, NO_LIMIT);
        assert!(config.rate_limit.policy_file.is_none());
    }

    #[test]
    fn test_invalid_baseline_rejected() {
        let config = RateLimitConfig {
            baseline_capacity: -3,
            ..RateLimitConfig::default()
        };
        assert_eq!(
            config.build_policy().unwrap_err(),
            PolicyError::InvalidBaseline(-3)
        );
    }

    #[test]
    fn test_missing_policy_file() {
        let config = RateLimitConfig {
            policy_file: Some(PathBuf::from("/nonexistent/tiered-limiter/policy.json")),
            ..RateLimitConfig::default()
        };
        assert!(matches!(
            config.build_policy(),
            Err(PolicyError::PolicyFile(_))
        ));
    }
}
