use anyhow::{Context, Result};
use tiered_limiter::config::{load_config, LimiterConfig, RateLimitConfig};
use tiered_limiter::rate_limit::{RateLimiter, Tier};
use tiered_limiter::SessionUser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Reads `<user-id> <tier|super|guest> <action>` lines from stdin and answers
/// `allow` or `deny` for each. Prints a stats snapshot as JSON on EOF.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiered_limiter=info".into()),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => load_config(&path)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("loading config from {}", path))?,
        None => LimiterConfig {
            rate_limit: RateLimitConfig::from_env(),
        },
    };

    let policy = config
        .rate_limit
        .build_policy()
        .context("invalid rate limit policy")?;
    let limiter = RateLimiter::new(policy);
    limiter.set_enabled(config.rate_limit.enabled);
    info!(enabled = config.rate_limit.enabled, "Tiered limiter ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [id, tier, action] = fields[..] else {
            if !fields.is_empty() {
                warn!(line = %line, "Expected '<user-id> <tier|super|guest> <action>'");
            }
            continue;
        };

        let user = match tier {
            "super" => {
                let user = SessionUser::authenticated(id, Tier::GUEST);
                user.set_superuser(true);
                user
            }
            "guest" => SessionUser::guest(),
            n => match n.parse::<u32>() {
                Ok(t) => SessionUser::authenticated(id, Tier(t)),
                Err(_) => {
                    warn!(tier = %n, "Invalid tier");
                    continue;
                }
            },
        };

        let verdict = if limiter.check_rate(&user, action) {
            "allow"
        } else {
            "deny"
        };
        println!("{}", verdict);
    }

    println!("{}", serde_json::to_string(&limiter.stats())?);
    Ok(())
}
