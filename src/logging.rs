// src/logging.rs

//! Logging setup for `sentinelle` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `--quiet` (warnings and errors only)
//! 3. `LOG_LEVEL` environment variable (e.g. "info", "debug", or the npmlog
//!    names "silly", "verbose" and "silent")
//! 4. default to `info`
//!
//! Logs are sent to STDERR; stdout belongs to the supervised process.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>, quiet: bool) -> Result<()> {
    let env_level = std::env::var(LOG_LEVEL_ENV).ok();
    let level = resolve_level(cli_level, quiet, env_level.as_deref());

    fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;

    Ok(())
}

/// Apply the priority order from the module docs.
pub fn resolve_level(cli_level: Option<LogLevel>, quiet: bool, env_level: Option<&str>) -> Level {
    if let Some(lvl) = cli_level {
        return level_from_log_level(lvl);
    }
    if quiet {
        return Level::WARN;
    }
    env_level.and_then(parse_level_str).unwrap_or(Level::INFO)
}

fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" | "silent" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" | "http" => Some(Level::INFO),
        "debug" | "verbose" => Some(Level::DEBUG),
        "trace" | "silly" => Some(Level::TRACE),
        _ => None,
    }
}

