//! Bootstrap configuration loading and config file resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the bootstrap TOML file
pub const CONFIG_ENV_VAR: &str = "NMON_CONFIG";

/// System-wide bootstrap TOML file
pub const SYSTEM_CONFIG_PATH: &str = "/etc/noise-monitor/nmon.toml";

/// Config file resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable (`NMON_CONFIG`)
/// 3. User config (`~/.config/noise-monitor/nmon.toml`) if it exists
/// 4. System config (`/etc/noise-monitor/nmon.toml`)
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Resolve the config file path. The returned file may not exist.
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_path {
            return path.clone();
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(user) = dirs::config_dir().map(|d| d.join("noise-monitor").join("nmon.toml")) {
            if user.exists() {
                return user;
            }
        }

        PathBuf::from(SYSTEM_CONFIG_PATH)
    }
}

/// Load a TOML file into `T`
///
/// A missing file is not an error: a warning is logged and `T::default()` is
/// returned. A file that exists but cannot be read or parsed is a
/// configuration error.
pub fn load_toml_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        warn!(
            path = %path.display(),
            "Config file not found, using built-in defaults"
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    let parsed = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!(path = %path.display(), "Loaded TOML configuration");
    Ok(parsed)
}

/// Filesystem locations used by the monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the process log
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Directory holding the measurement CSV files
    #[serde(default = "default_record_dir")]
    pub record_dir: PathBuf,

    /// Directory for raw samples and concatenated clips
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,

    /// Destination of enhanced detection clips
    #[serde(default = "default_detections_dir")]
    pub detections_dir: PathBuf,

    /// Edge Impulse model file (.eim)
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// sox noise profile used by detection enhancement
    #[serde(default = "default_noise_profile_path")]
    pub noise_profile_path: PathBuf,

    /// On/off flag file
    #[serde(default = "default_monitor_status_file")]
    pub monitor_status_file: PathBuf,

    /// KEY="value" credentials file for the telemetry endpoint
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/noise-monitor")
}

fn default_record_dir() -> PathBuf {
    PathBuf::from("/var/local/noise-monitor")
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("/var/local/noise-monitor/audio_samples")
}

fn default_detections_dir() -> PathBuf {
    PathBuf::from("/var/local/noise-monitor/detection_uploads")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("/usr/local/lib/noise-monitor/models/modelfile.eim")
}

fn default_noise_profile_path() -> PathBuf {
    PathBuf::from("/usr/local/lib/noise-monitor/noise.prof")
}

fn default_monitor_status_file() -> PathBuf {
    PathBuf::from("/usr/local/etc/noise-monitor/monitor_status")
}

fn default_credentials_file() -> PathBuf {
    PathBuf::from("/usr/local/etc/noise-monitor/adafruit-io")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            record_dir: default_record_dir(),
            audio_dir: default_audio_dir(),
            detections_dir: default_detections_dir(),
            model_path: default_model_path(),
            noise_profile_path: default_noise_profile_path(),
            monitor_status_file: default_monitor_status_file(),
            credentials_file: default_credentials_file(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (defaults to `<log_dir>/noise-monitor.log`)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Process log file, falling back to `<log_dir>/noise-monitor.log`
    pub fn resolve_file(&self, log_dir: &Path) -> PathBuf {
        self.file
            .clone()
            .unwrap_or_else(|| log_dir.join("noise-monitor.log"))
    }
}

/// Credentials loaded from a `KEY="value"` file
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    values: HashMap<String, String>,
}

impl Credentials {
    /// Parse `KEY=value` lines. Values may be wrapped in double quotes.
    /// Blank lines and `#` comments are skipped.
    pub fn parse(content: &str) -> Result<Self> {
        let mut values = HashMap::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                Error::InvalidInput(format!("Credentials line {} has no '='", idx + 1))
            })?;

            values.insert(
                key.trim().to_string(),
                value.trim().trim_matches('"').to_string(),
            );
        }

        Ok(Self { values })
    }

    /// Load and parse a credentials file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "Credentials file {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Fetch a key that must be present and non-blank
    pub fn require(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(value) if is_valid_key(value) => Ok(value),
            _ => Err(Error::Config(format!("Credential '{}' not configured", key))),
        }
    }
}

/// Validate a secret value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
