//! Runtime configuration loading from environment variables.
//!
//! All values are loaded from `DEVSCHED_*` environment variables with
//! sensible defaults. Invalid values fall back to defaults without crashing.
//! Child processes inherit the environment, so the core and every worker see
//! the same configuration as the submitting process.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `DEVSCHED_POLL_INTERVAL_MS` | 10 | Core loop idle interval (ms) |
//! | `DEVSCHED_FRAME_LIMIT` | 16777216 | Max IPC frame size (bytes) |
//! | `DEVSCHED_RESULT_GRACE_MS` | 2000 | Wait for a dead worker's report (ms) |
//! | `DEVSCHED_LOG_LEVEL` | info | Log filter directive |
//! | `DEVSCHED_LOG_FORMAT` | json | `json` or `pretty` |

use std::time::Duration;

use crate::ipc::DEFAULT_MAX_FRAME;
use crate::telemetry::{LogConfig, LogFormat};

pub const POLL_INTERVAL_ENV: &str = "DEVSCHED_POLL_INTERVAL_MS";
pub const FRAME_LIMIT_ENV: &str = "DEVSCHED_FRAME_LIMIT";
pub const RESULT_GRACE_ENV: &str = "DEVSCHED_RESULT_GRACE_MS";
pub const LOG_LEVEL_ENV: &str = "DEVSCHED_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "DEVSCHED_LOG_FORMAT";

const DEFAULT_POLL_MS: u64 = 10;
const DEFAULT_GRACE_MS: u64 = 2000;
pub const MIN_FRAME: usize = 4096; // floor: 4 KiB

/// Effective configuration summary, as printed by `devsched config show`.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub poll_interval_ms: u64,
    pub frame_limit: usize,
    pub result_grace_ms: u64,
    pub log_level: String,
    pub log_format: &'static str,
}

/// All configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Sleep between core passes when idle.
    pub poll_interval: Duration,
    /// Max body size of one frame on any channel.
    pub frame_limit: usize,
    /// How long to wait for an exited worker's outcome before declaring it lost.
    pub result_grace: Duration,
    pub log: LogConfig,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
            frame_limit: DEFAULT_MAX_FRAME,
            result_grace: Duration::from_millis(DEFAULT_GRACE_MS),
            log: LogConfig::default(),
        }
    }
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

fn load_log_config() -> LogConfig {
    let level = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "info".to_string());
    let format = std::env::var(LOG_FORMAT_ENV)
        .ok()
        .and_then(|s| LogFormat::parse(&s))
        .unwrap_or_default();
    LogConfig { format, level }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let poll_ms = parse_u64(POLL_INTERVAL_ENV, DEFAULT_POLL_MS).max(1);
    let frame_limit = parse_usize(FRAME_LIMIT_ENV, DEFAULT_MAX_FRAME).max(MIN_FRAME);
    let grace_ms = parse_u64(RESULT_GRACE_ENV, DEFAULT_GRACE_MS);

    EnvConfig {
        poll_interval: Duration::from_millis(poll_ms),
        frame_limit,
        result_grace: Duration::from_millis(grace_ms),
        log: load_log_config(),
    }
}

impl EnvConfig {
    /// Return a printable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            poll_interval_ms: self.poll_interval.as_millis() as u64,
            frame_limit: self.frame_limit,
            result_grace_ms: self.result_grace.as_millis() as u64,
            log_level: self.log.level.clone(),
            log_format: self.log.format.as_str(),
        }
    }
}
