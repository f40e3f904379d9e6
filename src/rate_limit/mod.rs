// Tiered rate limiting for command execution.
//
// Each (tier, action) pair gets its own token bucket, created lazily with the
// capacity the current policy resolves for it. Superusers and NO_LIMIT
// capacities never touch a bucket. Reloading the policy only affects buckets
// created afterwards.

pub mod bucket;
pub mod policy;
pub mod registry;
pub mod resolver;
pub mod stats;
pub mod tier;

pub use bucket::{Clock, ManualClock, SystemClock, TokenBucket};
pub use policy::{ActionRule, DefaultCapacities, PolicyError, PolicyStore, BASELINE_CAPACITY};
pub use registry::{BucketKey, BucketRegistry};
pub use resolver::{RateLimitedUser, Resolution, TierResolver};
pub use stats::{LimiterStats, StatsSnapshot};
pub use tier::{Capacity, Tier, NO_LIMIT};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Admission controller keyed by (effective tier, action).
///
/// Owns its bucket registry; share it behind an `Arc` for the lifetime of
/// the process.
pub struct RateLimiter {
    enabled: AtomicBool,
    policy: RwLock<Arc<PolicyStore>>,
    registry: BucketRegistry,
    resolver: TierResolver,
    clock: Arc<dyn Clock>,
    stats: LimiterStats,
}

impl RateLimiter {
    pub fn new(policy: PolicyStore) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: PolicyStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            policy: RwLock::new(Arc::new(policy)),
            registry: BucketRegistry::new(),
            resolver: TierResolver,
            clock,
            stats: LimiterStats::new(),
        }
    }

    /// Parse and install a policy. Calling again reloads.
    ///
    /// On error the previously installed policy stays active.
    pub fn init(&self, policy_json: &str, default_capacities: &str) -> Result<(), PolicyError> {
        let defaults = DefaultCapacities::parse_csv(default_capacities)?;
        let store = PolicyStore::from_json(policy_json, defaults)?;
        self.install(store);
        Ok(())
    }

    /// Install tier defaults with no override rules.
    ///
    /// For callers that choose to keep running after a policy failed to load.
    pub fn init_defaults_only(&self, defaults: DefaultCapacities) {
        warn!(
            tiers = defaults.len(),
            "Rate limit policy running in degraded mode: tier defaults only, no action overrides"
        );
        self.install(PolicyStore::defaults_only(defaults));
    }

    /// Swap in a prebuilt policy. Existing buckets keep their capacity.
    pub fn install(&self, store: PolicyStore) {
        info!(
            rules = store.rules().len(),
            tiers = store.defaults().len(),
            "Installed rate limit policy"
        );
        *self.policy.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(store);
    }

    /// Check and consume one admission for `user` performing `action`.
    ///
    /// Returns true if the call is allowed, false if rate limit exceeded.
    pub fn check_rate<U: RateLimitedUser + ?Sized>(&self, user: &U, action: &str) -> bool {
        if !self.enabled.load(Ordering::Relaxed) {
            return true;
        }

        let tier = match self.resolver.resolve(user) {
            Resolution::Bypass => {
                // Counted only; no bucket is created or consumed
                self.stats.record_bypassed();
                return true;
            }
            Resolution::Tier(tier) => tier,
        };

        let capacity = match self.policy().capacity_for(tier, action) {
            Capacity::Unlimited => {
                self.stats.record_unlimited();
                return true;
            }
            Capacity::Limited(n) => n,
        };

        let now = self.clock.now();
        let bucket = self
            .registry
            .get_or_create(&BucketKey::new(tier, action), capacity, now);

        if bucket.try_consume(now) {
            self.stats.record_allowed();
            true
        } else {
            self.stats.record_denied();
            debug!(
                user = %user.identifier(),
                tier = tier.0,
                action = %action,
                capacity = bucket.capacity(),
                "Rate limit exceeded"
            );
            false
        }
    }

    /// Currently installed policy.
    pub fn policy(&self) -> Arc<PolicyStore> {
        Arc::clone(&self.policy.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Turn all throttling off (`false`) or back on.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Remove buckets idle for at least `max_idle` that are back at full capacity.
    ///
    /// An evicted key starts again from a full bucket on its next call, which
    /// is the state it was evicted in.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let removed = self.registry.evict_idle(max_idle, self.clock.now());
        if removed > 0 {
            debug!(removed, "Evicted idle rate limit buckets");
        }
        removed
    }

    pub fn registry(&self) -> &BucketRegistry {
        &self.registry
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.registry.len())
    }
}
