use super::tier::Tier;

/// What the identity layer must expose for admission checks.
pub trait RateLimitedUser {
    fn is_superuser(&self) -> bool;

    /// Stable identifier, used for log context only.
    fn identifier(&self) -> &str;

    /// Current tier; `None` for guests and users never assigned one.
    fn rate_limit_tier(&self) -> Option<Tier>;
}

/// Outcome of tier resolution for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Admit without consulting any bucket.
    Bypass,
    Tier(Tier),
}

/// Maps a user to its effective tier, or to a bypass for superusers.
#[derive(Debug, Default, Clone, Copy)]
pub struct TierResolver;

impl TierResolver {
    pub fn resolve<U: RateLimitedUser + ?Sized>(&self, user: &U) -> Resolution {
        if user.is_superuser() {
            return Resolution::Bypass;
        }
        Resolution::Tier(user.rate_limit_tier().unwrap_or(Tier::GUEST))
    }
}
