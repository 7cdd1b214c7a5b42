//! Service modules for the sampling run
//!
//! Leaf collaborators (tools, statistics, inference, store, archive,
//! telemetry, flag) sit behind traits; `SamplingOrchestrator` drives them.

pub mod archive;
pub mod audio_tools;
pub mod classifier;
#[cfg(unix)]
pub mod eim_runner;
pub mod feature_extractor;
pub mod inference;
pub mod measurement_store;
pub mod monitor_flag;
pub mod pcm;
pub mod process;
pub mod sampling_orchestrator;
pub mod statistics;
pub mod telemetry;

pub use archive::{ArtifactDispatcher, RcloneArchive};
pub use audio_tools::{AudioTools, CaptureRequest, FfmpegTools};
pub use classifier::{ClassifyError, SlidingWindowClassifier};
#[cfg(unix)]
pub use eim_runner::{EimLoader, EimRunner};
pub use feature_extractor::FeatureExtractor;
pub use inference::{EngineError, InferenceEngine, ModelInfo, ModelLoader};
pub use measurement_store::{CsvMeasurementStore, MeasurementStore, StoreError};
pub use monitor_flag::MonitorFlag;
pub use pcm::{read_wav, PcmBuffer, PcmError};
pub use process::ToolError;
pub use sampling_orchestrator::{MonitorServices, RunReport, SamplingOrchestrator};
pub use statistics::{
    PcmStatistics, RawStatistics, SoxStatistics, StatisticsError, StatisticsSource,
};
pub use telemetry::{HttpTelemetry, TelemetryClient};
