//! Process log setup
//!
//! Events go to stderr and are appended to a timestamped log file. `RUST_LOG`
//! overrides the configured level.

use nmon_common::config::LoggingConfig;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{MonitorError, MonitorResult};

/// Install the global subscriber; returns the log file path
pub fn init_logging(config: &LoggingConfig, log_dir: &Path) -> MonitorResult<PathBuf> {
    let path = config.resolve_file(log_dir);
    let file = open_log_file(&path)?;

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|e| MonitorError::Config(format!("Logging already initialized: {}", e)))?;

    Ok(path)
}

/// `RUST_LOG` when set, otherwise the configured level
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Open the log file for appending, creating parent directories
pub fn open_log_file(path: &Path) -> MonitorResult<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}
