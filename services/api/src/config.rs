//! API service settings
//!
//! Loaded from `SKILLSWAP_*` environment variables on top of built-in defaults:
//!
//! - `SKILLSWAP_BIND_ADDRESS` (default: "0.0.0.0:3001")
//! - `SKILLSWAP_STREAM_POLL_INTERVAL_SECS` (default: 2)
//! - `SKILLSWAP_STREAM_CHANNEL_CAPACITY` (default: 64)
//! - `SKILLSWAP_TIME_ZONE`: zone for timestamps sent without an offset (default: "UTC")
//! - `SKILLSWAP_RUN_MIGRATIONS` (default: true)

use anyhow::Result;
use chrono_tz::Tz;
use config::{Config, Environment};
use serde::Deserialize;
use std::time::Duration;

/// API service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub bind_address: String,
    pub stream_poll_interval_secs: u64,
    pub stream_channel_capacity: u64,
    pub time_zone: String,
    pub run_migrations: bool,
}

impl ApiConfig {
    /// Read the configuration from the environment
    pub fn from_env() -> Result<Self> {
        let config: ApiConfig = Config::builder()
            .set_default("bind_address", "0.0.0.0:3001")?
            .set_default("stream_poll_interval_secs", 2_i64)?
            .set_default("stream_channel_capacity", 64_i64)?
            .set_default("time_zone", "UTC")?
            .set_default("run_migrations", true)?
            .add_source(Environment::with_prefix("SKILLSWAP").try_parsing(true))
            .build()?
            .try_deserialize()?;

        if config.stream_poll_interval_secs == 0 {
            anyhow::bail!("SKILLSWAP_STREAM_POLL_INTERVAL_SECS must be positive");
        }
        config.default_time_zone()?;

        Ok(config)
    }

    /// Longest wait between two reads of an idle message stream
    pub fn stream_poll_interval(&self) -> Duration {
        Duration::from_secs(self.stream_poll_interval_secs)
    }

    /// Zone used for naive timestamps
    pub fn default_time_zone(&self) -> Result<Tz> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid SKILLSWAP_TIME_ZONE {:?}: {}", self.time_zone, e))
    }
}
