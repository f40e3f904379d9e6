use super::bucket::TokenBucket;
use super::tier::Tier;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Identity of a bucket. Each action gets its own bucket even when several
/// actions fall back to the same tier default.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub tier: Tier,
    pub action: String,
}

impl BucketKey {
    pub fn new(tier: Tier, action: impl Into<String>) -> Self {
        Self {
            tier,
            action: action.into(),
        }
    }
}

/// Lazily populated map of (tier, action) -> bucket.
///
/// Buckets live until explicitly evicted. State is in-memory only.
pub struct BucketRegistry {
    buckets: DashMap<BucketKey, Arc<TokenBucket>>,
}

impl BucketRegistry {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    /// Return the bucket for `key`, creating a full one of `capacity` on first use.
    ///
    /// The entry API holds the shard lock across check-and-insert, so racing
    /// first callers all get the same bucket. `capacity` is ignored for
    /// buckets that already exist.
    pub fn get_or_create(&self, key: &BucketKey, capacity: u64, now: Instant) -> Arc<TokenBucket> {
        if let Some(bucket) = self.buckets.get(key) {
            return Arc::clone(bucket.value());
        }
        let bucket = self
            .buckets
            .entry(key.clone())
            .or_insert_with(|| Arc::new(TokenBucket::new(capacity, now)));
        Arc::clone(bucket.value())
    }

    pub fn get(&self, key: &BucketKey) -> Option<Arc<TokenBucket>> {
        self.buckets.get(key).map(|b| Arc::clone(b.value()))
    }

    /// Drop buckets untouched for at least `max_idle` that have refilled to
    /// capacity. Returns how many were removed.
    ///
    /// A partially drained bucket is kept, so eviction never hands a caller
    /// tokens ahead of the refill schedule.
    pub fn evict_idle(&self, max_idle: Duration, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| bucket.idle_for(now) < max_idle || !bucket.is_full(now));
        before.saturating_sub(self.buckets.len())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl Default for BucketRegistry {
    fn default() -> Self {
        Self::new()
    }
}
