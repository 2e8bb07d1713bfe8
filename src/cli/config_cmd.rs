// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These commands read configuration directly from environment variables
//! without starting a scheduler.

use crate::config::{
    self, EffectiveConfig, EnvConfig, FRAME_LIMIT_ENV, LOG_FORMAT_ENV, LOG_LEVEL_ENV,
    POLL_INTERVAL_ENV, RESULT_GRACE_ENV,
};

/// Print effective config as key-value pairs to stdout.
pub fn run_show() {
    let cfg = config::load().effective_config();
    print_config(&cfg);
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    print_config(&EnvConfig::default().effective_config());
}

/// Validate configuration for obvious misconfigurations.
///
/// Returns 0 if valid, 1 if any warnings are found.
pub fn run_validate() -> i32 {
    let env = config::load();
    let mut warnings = 0;

    if tracing_subscriber::EnvFilter::try_new(&env.log.level).is_err() {
        eprintln!("WARNING: {LOG_LEVEL_ENV} ({}) is not a valid filter", env.log.level);
        warnings += 1;
    }

    if env.result_grace.is_zero() {
        eprintln!("WARNING: {RESULT_GRACE_ENV} is 0; finished workers may be reported lost");
        warnings += 1;
    }

    if warnings == 0 {
        println!("Configuration is valid.");
        0
    } else {
        1
    }
}

fn print_config(cfg: &EffectiveConfig) {
    println!("{POLL_INTERVAL_ENV}={}", cfg.poll_interval_ms);
    println!("{FRAME_LIMIT_ENV}={}", cfg.frame_limit);
    println!("{RESULT_GRACE_ENV}={}", cfg.result_grace_ms);
    println!("{LOG_LEVEL_ENV}={}", cfg.log_level);
    println!("{LOG_FORMAT_ENV}={}", cfg.log_format);
}
