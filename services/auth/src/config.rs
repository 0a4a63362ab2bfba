//! Auth service settings
//!
//! Loaded from `SKILLSWAP_AUTH_*` environment variables on top of defaults:
//!
//! - `SKILLSWAP_AUTH_BIND_ADDRESS` (default: "0.0.0.0:3000")
//! - `SKILLSWAP_AUTH_LOGIN_MAX_ATTEMPTS` (default: 5)
//! - `SKILLSWAP_AUTH_LOGIN_WINDOW_SECS` (default: 300)
//! - `SKILLSWAP_AUTH_LOGIN_BAN_SECS` (default: 3600)

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

use crate::rate_limiter::RateLimiterConfig;

/// Auth service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub bind_address: String,
    pub login_max_attempts: u32,
    pub login_window_secs: u64,
    pub login_ban_secs: u64,
}

impl AuthConfig {
    /// Read the configuration from the environment
    pub fn from_env() -> Result<Self> {
        let config: AuthConfig = Config::builder()
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("login_max_attempts", 5_i64)?
            .set_default("login_window_secs", 300_i64)?
            .set_default("login_ban_secs", 3600_i64)?
            .add_source(Environment::with_prefix("SKILLSWAP_AUTH").try_parsing(true))
            .build()?
            .try_deserialize()?;

        if config.login_max_attempts == 0 {
            anyhow::bail!("SKILLSWAP_AUTH_LOGIN_MAX_ATTEMPTS must be positive");
        }

        Ok(config)
    }

    /// Login throttling settings
    pub fn rate_limiter(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            max_attempts: self.login_max_attempts,
            window_seconds: self.login_window_secs,
            ban_duration_seconds: self.login_ban_secs,
        }
    }
}
