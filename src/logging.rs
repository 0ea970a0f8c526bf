//! Logging infrastructure for theftcast runs.
//!
//! Logs go to the console and to daily-rotated files. By default the files
//! live in the platform data directory; a training run can point them at its
//! own output directory instead so the log travels with the artifact.
//!
//! ## Usage
//!
//! ```no_run
//! use theftcast::logging;
//!
//! // Initialize once at startup
//! logging::init(None).expect("Failed to initialize logging");
//!
//! tracing::info!("Pipeline started");
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// Gets the default log directory path based on platform conventions
///
/// Returns:
/// - Windows: `%APPDATA%/theftcast/logs`
/// - macOS: `~/Library/Application Support/theftcast/logs`
/// - Linux: `~/.local/share/theftcast/logs`
pub fn get_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;
    Ok(base_dir.join("theftcast").join("logs"))
}

/// Initializes the logging system with console and file output
///
/// Creates two log files in `log_dir` (or [`get_log_dir`] when `None`):
/// - `theftcast.<date>.log`: all levels admitted by the env filter
/// - `error.<date>.log`: warnings and errors only
///
/// # Errors
///
/// Returns error if the log directory cannot be created or file appenders fail
pub fn init(log_dir: Option<&Path>) -> Result<()> {
    let log_dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => get_log_dir()?,
    };

    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }

    let all_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("theftcast")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create all-logs file appender")?;

    let error_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("error")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create error-logs file appender")?;

    // Default to INFO, allow override with RUST_LOG
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")?;

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .compact();

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(all_logs_appender);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(error_logs_appender)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(
        "Logging initialized, writing to {}",
        current_log_path(&log_dir).display()
    );

    Ok(())
}

/// Gets the path to today's log file inside `log_dir`
pub fn current_log_path(log_dir: &Path) -> PathBuf {
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    log_dir.join(format!("theftcast.{today}.log"))
}
