//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on malformed values. In local dev,
//! call `dotenvy::dotenv().ok()` first so a `.env` file is honored.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

const DEFAULT_TICK_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    /// Auto-dispatch interval. `None` when `DISPATCH_TICK_SECS=0`.
    pub tick_interval: Option<Duration>,
    /// Roster TOML to register at startup.
    pub roster_path: Option<PathBuf>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let tick_secs = match std::env::var("DISPATCH_TICK_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!(
                    "DISPATCH_TICK_SECS must be a whole number of seconds, got '{raw}'"
                ))
            })?,
            Err(_) => DEFAULT_TICK_SECS,
        };

        Ok(Self {
            tick_interval: (tick_secs > 0).then(|| Duration::from_secs(tick_secs)),
            roster_path: optional_var("DISPATCH_ROSTER").map(PathBuf::from),
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            log_level: optional_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
