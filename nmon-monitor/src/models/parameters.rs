//! Sampling, profile and collaborator parameters
//!
//! Each struct maps to one table of the bootstrap TOML file. Every field has a
//! built-in default except the passing label set, which must come from the
//! active profile or the command line.

use serde::{Deserialize, Serialize};

/// How conversion, statistics and concatenation failures are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Log the failure, default the affected values and keep sampling
    #[default]
    Lenient,
    /// Promote the failure to fatal-to-run
    Strict,
}

/// Where sample statistics come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticsBackend {
    /// `sox <wav> -n stat` report
    #[default]
    Sox,
    /// Computed in-process from the decoded PCM
    Native,
}

/// What gets uploaded to the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveMode {
    /// One concatenated clip per qualifying run
    #[default]
    Concatenated,
    /// Each passing raw sample as soon as it passes
    PerSample,
}

/// `[sampling]` run cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingParameters {
    /// Samples per run (default: 3)
    #[serde(default = "default_sample_count")]
    pub sample_count: u32,

    /// Capture length in seconds (default: 10)
    #[serde(default = "default_sample_duration_secs")]
    pub sample_duration_secs: u64,

    /// Pause between samples in seconds (default: 120)
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,

    #[serde(default)]
    pub strictness: Strictness,
}

/// `[profiles.<name>]` deployment profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// ALSA input device (default: "hw:1,0")
    #[serde(default = "default_device")]
    pub device: String,

    /// Capture channel count (default: 1)
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Capture sample rate in Hz (default: 44100)
    #[serde(default = "default_capture_sample_rate")]
    pub capture_sample_rate: u32,

    /// Resample rate applied during PCM conversion (default: keep source rate)
    #[serde(default)]
    pub convert_sample_rate: Option<u32>,

    /// Labels that keep a run qualifying
    #[serde(default)]
    pub passing_labels: Vec<String>,

    /// Window stride as a fraction of the model window (default: 0.25)
    #[serde(default = "default_overlap")]
    pub overlap: f64,

    /// Archive destination override for this profile
    #[serde(default)]
    pub archive_remote: Option<String>,
}

/// `[tools]` external utilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    #[serde(default = "default_sox")]
    pub sox: String,

    #[serde(default = "default_rclone")]
    pub rclone: String,

    /// Extra seconds allowed on top of the capture duration (default: 10)
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,

    /// Keep the intermediate WAV after measuring (default: false)
    #[serde(default)]
    pub keep_pcm: bool,

    /// Noise-reduce and normalize the clip before archiving (default: false)
    #[serde(default)]
    pub enhance_detections: bool,

    #[serde(default)]
    pub statistics: StatisticsBackend,
}

/// `[telemetry]` endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Value reported for runs that did not qualify (default: 0.0)
    #[serde(default)]
    pub no_signal_value: f64,

    /// HTTP request timeout in seconds (default: 15)
    #[serde(default = "default_telemetry_timeout_secs")]
    pub timeout_secs: u64,

    /// Endpoint override; otherwise ADAFRUIT_IO_URL from the credentials file
    #[serde(default)]
    pub url: Option<String>,
}

/// `[archive]` upload settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// rclone remote (default: "gdrive:noise-monitor-uploads")
    #[serde(default = "default_archive_remote")]
    pub remote: String,

    #[serde(default)]
    pub mode: ArchiveMode,

    /// Upload timeout in seconds (default: 300)
    #[serde(default = "default_archive_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_sample_count() -> u32 {
    3
}

fn default_sample_duration_secs() -> u64 {
    10
}

fn default_sample_interval_secs() -> u64 {
    120
}

fn default_device() -> String {
    "hw:1,0".to_string()
}

fn default_channels() -> u16 {
    1
}

fn default_capture_sample_rate() -> u32 {
    44100
}

pub(crate) fn default_overlap() -> f64 {
    0.25
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_sox() -> String {
    "sox".to_string()
}

fn default_rclone() -> String {
    "rclone".to_string()
}

fn default_grace_secs() -> u64 {
    10
}

fn default_telemetry_timeout_secs() -> u64 {
    15
}

fn default_archive_remote() -> String {
    "gdrive:noise-monitor-uploads".to_string()
}

fn default_archive_timeout_secs() -> u64 {
    300
}

impl Default for SamplingParameters {
    fn default() -> Self {
        Self {
            sample_count: default_sample_count(),
            sample_duration_secs: default_sample_duration_secs(),
            sample_interval_secs: default_sample_interval_secs(),
            strictness: Strictness::default(),
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            channels: default_channels(),
            capture_sample_rate: default_capture_sample_rate(),
            convert_sample_rate: None,
            passing_labels: Vec::new(),
            overlap: default_overlap(),
            archive_remote: None,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            sox: default_sox(),
            rclone: default_rclone(),
            grace_secs: default_grace_secs(),
            keep_pcm: false,
            enhance_detections: false,
            statistics: StatisticsBackend::default(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            no_signal_value: 0.0,
            timeout_secs: default_telemetry_timeout_secs(),
            url: None,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            remote: default_archive_remote(),
            mode: ArchiveMode::default(),
            timeout_secs: default_archive_timeout_secs(),
        }
    }
}
