use super::RateLimitConfig;

pub const ENV_ENABLED: &str = "TIERED_LIMITER_ENABLED";
pub const ENV_DEFAULT_CAPACITIES: &str = "TIERED_LIMITER_DEFAULT_CAPACITIES";
pub const ENV_BASELINE_CAPACITY: &str = "TIERED_LIMITER_BASELINE_CAPACITY";
pub const ENV_POLICY_JSON: &str = "TIERED_LIMITER_POLICY_JSON";

impl RateLimitConfig {
    /// Build from env vars, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    /// Override fields from env vars. Values that don't parse are ignored.
    ///
    /// Capacity strings are taken verbatim and validated when the policy is built.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var(ENV_ENABLED) {
            if let Ok(b) = v.parse::<bool>() {
                self.enabled = b;
            }
        }
        if let Some(v) = var(ENV_DEFAULT_CAPACITIES) {
            self.default_capacities = v;
        }
        if let Some(v) = var(ENV_BASELINE_CAPACITY) {
            if let Ok(n) = v.parse::<i64>() {
                self.baseline_capacity = n;
            }
        }
        if let Some(v) = var(ENV_POLICY_JSON) {
            self.policy_json = Some(v);
        }
    }
}
