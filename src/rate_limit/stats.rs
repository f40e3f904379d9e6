use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

const NEVER: i64 = i64::MIN;

/// Lifetime admission counters.
///
/// `bypassed` counts superuser calls and `unlimited` counts NO_LIMIT calls;
/// both are admitted without creating or consuming any bucket, so these
/// counters are the only trace they leave.
#[derive(Debug)]
pub struct LimiterStats {
    allowed: AtomicU64,
    denied: AtomicU64,
    bypassed: AtomicU64,
    unlimited: AtomicU64,
    last_denied_ms: AtomicI64,
}

/// Point-in-time copy of [`LimiterStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub allowed: u64,
    pub denied: u64,
    pub bypassed: u64,
    pub unlimited: u64,
    pub buckets: usize,
    pub last_denied_at: Option<DateTime<Utc>>,
}

impl LimiterStats {
    pub fn new() -> Self {
        Self {
            allowed: AtomicU64::new(0),
            denied: AtomicU64::new(0),
            bypassed: AtomicU64::new(0),
            unlimited: AtomicU64::new(0),
            last_denied_ms: AtomicI64::new(NEVER),
        }
    }

    pub(crate) fn record_allowed(&self) {
        self.allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_denied(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
        self.last_denied_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub(crate) fn record_bypassed(&self) {
        self.bypassed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unlimited(&self) {
        self.unlimited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, buckets: usize) -> StatsSnapshot {
        let last_denied_at = match self.last_denied_ms.load(Ordering::Relaxed) {
            NEVER => None,
            ms => DateTime::from_timestamp_millis(ms),
        };
        StatsSnapshot {
            allowed: self.allowed.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            unlimited: self.unlimited.load(Ordering::Relaxed),
            buckets,
            last_denied_at,
        }
    }
}

impl Default for LimiterStats {
    fn default() -> Self {
        Self::new()
    }
}
