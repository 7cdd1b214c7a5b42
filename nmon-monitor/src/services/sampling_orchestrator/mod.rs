//! Sampling run orchestrator
//!
//! # State Progression
//! IDLE → CAPTURING → CONVERTING → MEASURING → DECIDING →
//! (ACCUMULATING → CAPTURING | FINALIZE_PASS | FINALIZE_FAIL) → DISPATCHED → IDLE
//!
//! Each state is handled by a `phase_*` method in its own file:
//!
//! - **CAPTURING**: record one compressed sample from the input device
//! - **CONVERTING / MEASURING**: PCM conversion, statistics, classification
//! - **DECIDING / ACCUMULATING**: passing-label check, clip concatenation
//! - **FINALIZE_PASS / FINALIZE_FAIL / DISPATCHED**: archive or drop the clip,
//!   persist records, report telemetry
//!
//! A run is strictly sequential. The cancellation token is checked between
//! phases and during the inter-sample wait.

use nmon_common::Clock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::models::{RunAccumulator, RunOutcome, RunState};
use crate::services::{
    ArtifactDispatcher, AudioTools, FeatureExtractor, InferenceEngine, MeasurementStore,
    ModelLoader, MonitorFlag, SlidingWindowClassifier, StatisticsSource, TelemetryClient,
};

mod phase_accumulate;
mod phase_capture;
mod phase_finalize;
mod phase_measure;

/// Collaborators used by a run
#[derive(Clone)]
pub struct MonitorServices {
    pub tools: Arc<dyn AudioTools>,
    pub statistics: Arc<dyn StatisticsSource>,
    pub model_loader: Arc<dyn ModelLoader>,
    pub store: Arc<dyn MeasurementStore>,
    pub archive: Arc<dyn ArtifactDispatcher>,
    pub telemetry: Arc<dyn TelemetryClient>,
    pub clock: Arc<dyn Clock>,
    pub flag: MonitorFlag,
}

/// Result of one run
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub run: RunAccumulator,
    /// CSV file the records went to
    pub record_file: Option<PathBuf>,
    /// At least one artifact of this run reached the archive
    pub archived: bool,
    /// Value sent to the telemetry endpoint; None for disabled runs
    pub telemetry_value: Option<f64>,
}

/// How the sampling loop stopped
#[derive(Debug)]
enum LoopEnd {
    Completed,
    Disqualified,
    Aborted(String),
    Cancelled,
}

/// Sampling run orchestrator
pub struct SamplingOrchestrator {
    config: MonitorConfig,
    services: MonitorServices,
    extractor: FeatureExtractor,
    classifier: SlidingWindowClassifier,
}

impl SamplingOrchestrator {
    pub fn new(config: MonitorConfig, services: MonitorServices) -> Self {
        let extractor = FeatureExtractor::new(services.clock.clone());
        let classifier = SlidingWindowClassifier::new(config.run.overlap);
        Self {
            config,
            services,
            extractor,
            classifier,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Execute one complete sampling run
    ///
    /// Returns Err only for configuration-fatal conditions (model load,
    /// unusable audio directory) or when the records could not be persisted.
    /// Capture failures end the run as `RunOutcome::Aborted` after dispatch.
    pub async fn run(&self, cancel: &CancellationToken) -> MonitorResult<RunReport> {
        let mut run = RunAccumulator::new();

        if !self.services.flag.is_enabled() {
            run.transition_to(RunState::Idle);
            return Ok(RunReport {
                outcome: RunOutcome::Disabled,
                run,
                record_file: None,
                archived: false,
                telemetry_value: None,
            });
        }

        std::fs::create_dir_all(&self.config.paths.audio_dir).map_err(|e| {
            MonitorError::Config(format!(
                "Cannot create audio directory {}: {}",
                self.config.paths.audio_dir.display(),
                e
            ))
        })?;

        let mut engine = self
            .services
            .model_loader
            .load(&self.config.paths.model_path)
            .await?;

        tracing::info!(
            run_id = %run.run_id,
            profile = %self.config.profile_name,
            sample_count = self.config.run.sample_count,
            "Sampling run started"
        );

        let end = self.sample_loop(&mut run, engine.as_mut(), cancel).await;
        drop(engine);

        let qualified =
            matches!(end, LoopEnd::Completed) && run.qualifying && !run.samples.is_empty();

        if qualified {
            self.phase_finalize_pass(&mut run).await;
        } else {
            self.phase_finalize_fail(&mut run).await;
        }

        let (record_file, telemetry_value, store_result) =
            self.phase_dispatch(&mut run, qualified).await;

        run.transition_to(RunState::Idle);

        let outcome = match end {
            LoopEnd::Completed if qualified => RunOutcome::Qualified,
            LoopEnd::Completed | LoopEnd::Disqualified => RunOutcome::Disqualified,
            LoopEnd::Aborted(reason) => RunOutcome::Aborted(reason),
            LoopEnd::Cancelled => RunOutcome::Cancelled,
        };

        tracing::info!(
            run_id = %run.run_id,
            target_detected = qualified,
            samples = run.samples.len(),
            telemetry_value,
            outcome = ?outcome,
            "Finished processing"
        );

        store_result?;

        let archived = !run.uploaded.is_empty();
        Ok(RunReport {
            outcome,
            run,
            record_file,
            archived,
            telemetry_value: Some(telemetry_value),
        })
    }

    async fn sample_loop(
        &self,
        run: &mut RunAccumulator,
        engine: &mut dyn InferenceEngine,
        cancel: &CancellationToken,
    ) -> LoopEnd {
        let count = self.config.run.sample_count as usize;

        for index in 1..=count {
            if cancel.is_cancelled() {
                return self.cancelled(run);
            }

            let captured = match self.phase_capture(run, index).await {
                Ok(captured) => captured,
                Err(e) => {
                    tracing::error!(run_id = %run.run_id, index, error = %e, "Capture failed, aborting run");
                    return LoopEnd::Aborted(e.to_string());
                }
            };

            if cancel.is_cancelled() {
                return self.cancelled(run);
            }

            let sample = match self.phase_measure(run, engine, captured).await {
                Ok(sample) => sample,
                Err(e) => {
                    tracing::error!(run_id = %run.run_id, index, error = %e, "Measurement failed, aborting run");
                    return LoopEnd::Aborted(e.to_string());
                }
            };

            if !self.phase_decide(run, sample) {
                return LoopEnd::Disqualified;
            }

            if cancel.is_cancelled() {
                return self.cancelled(run);
            }

            if let Err(e) = self.phase_accumulate(run).await {
                tracing::error!(run_id = %run.run_id, index, error = %e, "Accumulation failed, aborting run");
                return LoopEnd::Aborted(e.to_string());
            }

            if index < count && !self.wait_interval(cancel).await {
                return self.cancelled(run);
            }
        }

        LoopEnd::Completed
    }

    fn cancelled(&self, run: &RunAccumulator) -> LoopEnd {
        tracing::warn!(
            run_id = %run.run_id,
            samples = run.samples.len(),
            "Run cancelled"
        );
        LoopEnd::Cancelled
    }
}
