//! Test Helper Utilities
//!
//! Shared utilities for testing nmon-monitor

#![allow(dead_code)]

pub mod audio_generator;
pub mod mocks;

pub use audio_generator::{generate_tone_wav, ToneConfig};
pub use mocks::{
    FailingStore, MockTools, RecordingArchive, RecordingTelemetry, ScriptedLoader,
    ScriptedStatistics,
};

use chrono::{Local, TimeZone};
use nmon_common::config::PathsConfig;
use nmon_common::{Clock, FixedClock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use nmon_monitor::services::{
    CsvMeasurementStore, MeasurementStore, ModelInfo, MonitorFlag, MonitorServices,
    SamplingOrchestrator,
};
use nmon_monitor::{CliOverrides, MonitorConfig, MonitorToml};

pub const WINDOW_LEN: usize = 1600;
pub const MODEL_RATE: u32 = 16000;

pub fn model_info() -> ModelInfo {
    ModelInfo {
        window_len: WINDOW_LEN,
        sample_rate: MODEL_RATE,
        labels: vec!["A".to_string(), "B".to_string(), "noise".to_string()],
    }
}

/// One PCM window per sample
pub fn one_window_pcm() -> ToneConfig {
    ToneConfig {
        sample_rate: MODEL_RATE,
        frames: WINDOW_LEN,
        ..Default::default()
    }
}

/// Paths for one test run, all under a temp dir
pub fn temp_paths(root: &Path) -> PathsConfig {
    PathsConfig {
        log_dir: root.join("log"),
        record_dir: root.join("records"),
        audio_dir: root.join("audio_samples"),
        detections_dir: root.join("detection_uploads"),
        model_path: root.join("model.eim"),
        noise_profile_path: root.join("noise.prof"),
        monitor_status_file: root.join("etc").join("monitor_status"),
        credentials_file: root.join("etc").join("adafruit-io"),
    }
}

/// Bootstrap config: 3 samples of 1s, no interval, passing set {A}
pub fn test_toml(root: &Path) -> MonitorToml {
    let mut toml = MonitorToml::default();
    toml.paths = temp_paths(root);
    toml.sampling.sample_count = 3;
    toml.sampling.sample_duration_secs = 1;
    toml.sampling.sample_interval_secs = 0;
    toml.telemetry.no_signal_value = -1.0;
    toml
}

pub fn resolve(toml: MonitorToml) -> MonitorConfig {
    MonitorConfig::resolve(
        toml,
        CliOverrides {
            passing_labels: Some(vec!["A".to_string()]),
            ..Default::default()
        },
    )
    .unwrap()
}

pub fn test_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::new(
        Local.with_ymd_and_hms(2024, 3, 4, 9, 5, 7).unwrap(),
    ))
}

/// Orchestrator with scripted collaborators and a real CSV store
pub struct TestRig {
    pub dir: TempDir,
    pub tools: Arc<MockTools>,
    pub loader: Arc<ScriptedLoader>,
    pub archive: Arc<RecordingArchive>,
    pub telemetry: Arc<RecordingTelemetry>,
    pub orchestrator: SamplingOrchestrator,
}

/// Builder for `TestRig`
pub struct RigBuilder {
    pub dir: TempDir,
    pub toml: MonitorToml,
    pub tools: MockTools,
    pub loader: ScriptedLoader,
    pub rms: Vec<f64>,
    pub store: Option<Arc<dyn MeasurementStore>>,
}

impl RigBuilder {
    /// `labels` is the classification of each sample, in order
    pub fn new(labels: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let toml = test_toml(dir.path());
        Self {
            dir,
            toml,
            tools: MockTools::new(one_window_pcm()),
            loader: ScriptedLoader::new(model_info(), labels),
            rms: vec![0.01, 0.1, 1.0],
            store: None,
        }
    }

    pub fn build(self) -> TestRig {
        let config = resolve(self.toml);
        let clock = test_clock();

        let tools = Arc::new(self.tools);
        let loader = Arc::new(self.loader);
        let archive = Arc::new(RecordingArchive::default());
        let telemetry = Arc::new(RecordingTelemetry::default());
        let store = self.store.unwrap_or_else(|| {
            Arc::new(CsvMeasurementStore::new(
                config.paths.record_dir.clone(),
                clock.clone(),
            ))
        });

        let services = MonitorServices {
            tools: tools.clone(),
            statistics: Arc::new(ScriptedStatistics::new(&self.rms)),
            model_loader: loader.clone(),
            store,
            archive: archive.clone(),
            telemetry: telemetry.clone(),
            clock,
            flag: MonitorFlag::new(config.paths.monitor_status_file.clone()),
        };

        TestRig {
            dir: self.dir,
            tools,
            loader,
            archive,
            telemetry,
            orchestrator: SamplingOrchestrator::new(config, services),
        }
    }
}

impl TestRig {
    pub fn paths(&self) -> &PathsConfig {
        &self.orchestrator.config().paths
    }

    /// Concatenated clip path for the fixed test clock
    pub fn clip_path(&self) -> PathBuf {
        self.paths().audio_dir.join("2024-03-04_09-05-07.mp3")
    }

    pub fn sample_path(&self, index: usize) -> PathBuf {
        self.paths()
            .audio_dir
            .join(format!("2024-03-04_09-05-07_{:02}.mp3", index))
    }

    pub fn record_file(&self) -> PathBuf {
        self.paths()
            .record_dir
            .join("noise-monitor_records_2024-03-04_09-05.csv")
    }

    /// Data rows of the record file (header excluded)
    pub fn record_rows(&self) -> Vec<String> {
        match std::fs::read_to_string(self.record_file()) {
            Ok(content) => content.lines().skip(1).map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn set_flag(&self, content: &str) {
        let path = &self.paths().monitor_status_file;
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}
