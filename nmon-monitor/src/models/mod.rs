//! Data models for nmon-monitor
//!
//! - Sampling run state machine and accumulator
//! - Per-sample features, classification and persisted record
//! - Run and collaborator parameters

pub mod parameters;
pub mod run_session;
pub mod sample;

pub use parameters::{
    ArchiveConfig, ArchiveMode, ProfileConfig, SamplingParameters, StatisticsBackend,
    Strictness, TelemetryConfig, ToolsConfig,
};
pub use run_session::{RunAccumulator, RunOutcome, RunState, StateTransition};
pub use sample::{ClassificationResult, FeatureSet, MeasurementRecord, Sample};
