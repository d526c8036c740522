//! Structured Logger
//!
//! Console output for operators plus a daily-rolling NDJSON file for later
//! analysis. `RUST_LOG` overrides the configured level.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix of the rolling log (`concierge.log.YYYY-MM-DD`).
pub const LOG_FILE_PREFIX: &str = "concierge.log";

/// Initialize the global structured logger.
///
/// Returns an error if the log directory cannot be created. Installing a
/// second global subscriber is silently ignored.
pub fn init_logger<P: AsRef<Path>>(log_dir: P, level: &str) -> Result<()> {
    install(log_dir.as_ref(), level, true)
}

/// Like [`init_logger`], but only the file layer. Used by interactive
/// commands whose terminal belongs to the user.
pub fn init_file_logger<P: AsRef<Path>>(log_dir: P, level: &str) -> Result<()> {
    install(log_dir.as_ref(), level, false)
}

fn install(log_dir: &Path, level: &str, console: bool) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);

    let file_layer = fmt::layer()
        .json()
        .with_writer(file_appender)
        .with_ansi(false);

    let console_layer = console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(true)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
    Ok(())
}
