//! Configuration resolution for nmon-monitor
//!
//! Priority: CLI override → active `[profiles.<name>]` table → `[sampling]`
//! table → built-in default.

use nmon_common::config::{load_toml_or_default, Credentials, LoggingConfig, PathsConfig};
use nmon_common::time::secs_to_duration;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::error::{MonitorError, MonitorResult};
use crate::models::{
    ArchiveConfig, ProfileConfig, SamplingParameters, Strictness, TelemetryConfig, ToolsConfig,
};

/// Credentials file key holding the telemetry API key
pub const CREDENTIAL_KEY: &str = "ADAFRUIT_IO_KEY";
/// Credentials file key holding the telemetry feed URL
pub const CREDENTIAL_URL: &str = "ADAFRUIT_IO_URL";

/// Name of the profile used when none is selected
pub const DEFAULT_PROFILE: &str = "default";

/// Bootstrap TOML file layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorToml {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub sampling: SamplingParameters,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Active profile (default: "default")
    #[serde(default = "default_profile")]
    pub profile: String,

    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

impl Default for MonitorToml {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            logging: LoggingConfig::default(),
            sampling: SamplingParameters::default(),
            tools: ToolsConfig::default(),
            telemetry: TelemetryConfig::default(),
            archive: ArchiveConfig::default(),
            profile: default_profile(),
            profiles: BTreeMap::new(),
        }
    }
}

/// Bootstrap file read before logging exists
///
/// Holds the load result so the binary can start logging first (with
/// built-in defaults if the file is unusable) and then report the outcome
/// into the process log.
#[derive(Debug)]
pub struct BootstrapLoad {
    pub path: PathBuf,
    pub found: bool,
    pub toml: nmon_common::Result<MonitorToml>,
}

impl BootstrapLoad {
    pub fn read(path: PathBuf) -> Self {
        let found = path.exists();
        let toml = load_toml_or_default(&path);
        Self { path, found, toml }
    }

    /// Logging settings and log directory to start with
    pub fn logging(&self) -> (LoggingConfig, PathBuf) {
        match &self.toml {
            Ok(toml) => (toml.logging.clone(), toml.paths.log_dir.clone()),
            Err(_) => (LoggingConfig::default(), PathsConfig::default().log_dir),
        }
    }
}

/// Command-line overrides; `None` leaves the TOML value in place
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub profile: Option<String>,
    pub device: Option<String>,
    pub sample_duration_secs: Option<u64>,
    pub sample_interval_secs: Option<u64>,
    pub sample_count: Option<u32>,
    pub passing_labels: Option<Vec<String>>,
    pub model_path: Option<PathBuf>,
    pub noise_profile_path: Option<PathBuf>,
    pub overlap: Option<f64>,
    pub strictness: Option<Strictness>,
}

/// Parameters of one sampling run
#[derive(Debug, Clone)]
pub struct RunParameters {
    pub device: String,
    pub channels: u16,
    pub capture_sample_rate: u32,
    pub convert_sample_rate: Option<u32>,
    pub sample_count: u32,
    pub sample_duration: Duration,
    pub sample_interval: Duration,
    pub passing_labels: BTreeSet<String>,
    pub overlap: f64,
    pub strictness: Strictness,
}

impl RunParameters {
    pub fn is_passing(&self, label: &str) -> bool {
        self.passing_labels.contains(label)
    }
}

/// Fully resolved monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub profile_name: String,
    pub paths: PathsConfig,
    pub logging: LoggingConfig,
    pub run: RunParameters,
    pub tools: ToolsConfig,
    pub telemetry: TelemetryConfig,
    pub archive: ArchiveConfig,
}

impl MonitorConfig {
    /// Merge the bootstrap file with command-line overrides
    ///
    /// An unknown profile name is a configuration error. When no profiles are
    /// defined at all, "default" resolves to built-in profile defaults.
    pub fn resolve(toml: MonitorToml, overrides: CliOverrides) -> MonitorResult<Self> {
        let profile_name = overrides.profile.clone().unwrap_or(toml.profile);

        let profile = match toml.profiles.get(&profile_name) {
            Some(p) => p.clone(),
            None if profile_name == DEFAULT_PROFILE => ProfileConfig::default(),
            None => {
                return Err(MonitorError::Config(format!(
                    "Profile '{}' not defined (available: {})",
                    profile_name,
                    toml.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
                )))
            }
        };

        let mut paths = toml.paths;
        if let Some(model) = overrides.model_path {
            paths.model_path = model;
        }
        if let Some(noise) = overrides.noise_profile_path {
            paths.noise_profile_path = noise;
        }

        let mut archive = toml.archive;
        if let Some(remote) = profile.archive_remote.clone() {
            archive.remote = remote;
        }

        let passing_labels = overrides
            .passing_labels
            .unwrap_or(profile.passing_labels)
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();

        let run = RunParameters {
            device: overrides.device.unwrap_or(profile.device),
            channels: profile.channels,
            capture_sample_rate: profile.capture_sample_rate,
            convert_sample_rate: profile.convert_sample_rate,
            sample_count: overrides.sample_count.unwrap_or(toml.sampling.sample_count),
            sample_duration: secs_to_duration(
                overrides
                    .sample_duration_secs
                    .unwrap_or(toml.sampling.sample_duration_secs),
            ),
            sample_interval: secs_to_duration(
                overrides
                    .sample_interval_secs
                    .unwrap_or(toml.sampling.sample_interval_secs),
            ),
            passing_labels,
            overlap: overrides.overlap.unwrap_or(profile.overlap),
            strictness: overrides.strictness.unwrap_or(toml.sampling.strictness),
        };

        let config = Self {
            profile_name,
            paths,
            logging: toml.logging,
            run,
            tools: toml.tools,
            telemetry: toml.telemetry,
            archive,
        };
        config.validate()?;

        info!(
            profile = %config.profile_name,
            device = %config.run.device,
            sample_count = config.run.sample_count,
            passing_labels = ?config.run.passing_labels,
            "Monitor configuration resolved"
        );

        Ok(config)
    }

    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> MonitorResult<()> {
        if self.run.sample_count == 0 {
            return Err(MonitorError::Config("sample_count must be at least 1".into()));
        }
        if self.run.sample_duration.is_zero() {
            return Err(MonitorError::Config(
                "sample_duration_secs must be at least 1".into(),
            ));
        }
        if !(self.run.overlap > 0.0 && self.run.overlap <= 1.0) {
            return Err(MonitorError::Config(format!(
                "overlap must be in (0, 1], got {}",
                self.run.overlap
            )));
        }
        if self.run.passing_labels.is_empty() {
            return Err(MonitorError::Config(format!(
                "Profile '{}' has no passing labels",
                self.profile_name
            )));
        }
        if self.run.device.trim().is_empty() {
            return Err(MonitorError::Config("Capture device is empty".into()));
        }
        Ok(())
    }

    /// Deadline for capture and conversion
    pub fn capture_deadline(&self) -> Duration {
        self.run.sample_duration + secs_to_duration(self.tools.grace_secs)
    }

    /// Deadline for concatenation, enhancement and statistics
    pub fn tool_deadline(&self) -> Duration {
        secs_to_duration(self.tools.grace_secs.max(30))
    }
}

/// Telemetry endpoint and API key
#[derive(Debug, Clone)]
pub struct TelemetryEndpoint {
    pub url: String,
    pub api_key: String,
}

impl TelemetryEndpoint {
    /// Resolve from the credentials file; `[telemetry] url` overrides the file URL
    ///
    /// A blank override is ignored. A non-blank override that is not an
    /// http(s) URL is a configuration error.
    pub fn resolve(telemetry: &TelemetryConfig, credentials: &Credentials) -> MonitorResult<Self> {
        let api_key = credentials.require(CREDENTIAL_KEY)?.to_string();

        let url = match telemetry.url.as_deref().map(str::trim) {
            Some(url) if url.is_empty() => credentials.require(CREDENTIAL_URL)?.trim().to_string(),
            Some(url) => url.to_string(),
            None => credentials.require(CREDENTIAL_URL)?.trim().to_string(),
        };

        if !is_http_url(&url) {
            return Err(MonitorError::Config(format!(
                "Telemetry URL must start with http:// or https://, got '{}'",
                url
            )));
        }

        Ok(Self { url, api_key })
    }
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty())
}
