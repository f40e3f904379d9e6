// Loading and environment overrides
pub mod config;

// Tiered token-bucket admission control
pub mod rate_limit;

// Identity-layer user model
pub mod user;

pub use rate_limit::{RateLimitedUser, RateLimiter};
pub use user::SessionUser;
