use crate::rate_limit::{RateLimitedUser, Tier};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

const GUEST_IDENTIFIER: &str = "__GUEST__";
// Outside the u32 tier range, so every real tier stays representable
const UNASSIGNED_TIER: u64 = u64::MAX;

/// A session's user as seen by the rate limiter.
///
/// Superuser flag and tier can be changed at any time from other threads;
/// the next admission check observes the new values.
#[derive(Debug)]
pub struct SessionUser {
    identifier: String,
    superuser: AtomicBool,
    tier: AtomicU64,
}

impl SessionUser {
    /// Unauthenticated user with no assigned tier.
    pub fn guest() -> Self {
        Self {
            identifier: GUEST_IDENTIFIER.to_string(),
            superuser: AtomicBool::new(false),
            tier: AtomicU64::new(UNASSIGNED_TIER),
        }
    }

    pub fn authenticated(identifier: impl Into<String>, tier: Tier) -> Self {
        Self {
            identifier: identifier.into(),
            superuser: AtomicBool::new(false),
            tier: AtomicU64::new(u64::from(tier.0)),
        }
    }

    pub fn set_superuser(&self, superuser: bool) {
        self.superuser.store(superuser, Ordering::Release);
    }

    pub fn set_rate_limit_tier(&self, tier: Tier) {
        self.tier.store(u64::from(tier.0), Ordering::Release);
    }

    pub fn is_guest(&self) -> bool {
        self.identifier == GUEST_IDENTIFIER
    }
}

impl RateLimitedUser for SessionUser {
    fn is_superuser(&self) -> bool {
        self.superuser.load(Ordering::Acquire)
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn rate_limit_tier(&self) -> Option<Tier> {
        u32::try_from(self.tier.load(Ordering::Acquire))
            .ok()
            .map(Tier)
    }
}
