//! CONVERTING → MEASURING
//!
//! Decode the capture to PCM WAV, derive features and classify. In lenient
//! mode conversion and statistics failures degrade the sample (zeroed
//! statistics, no label) instead of stopping the run. Classification failures
//! always degrade.

use std::path::Path;

use super::phase_capture::CapturedSample;
use super::SamplingOrchestrator;
use crate::error::{MonitorError, MonitorResult};
use crate::models::{ClassificationResult, RunAccumulator, RunState, Sample, Strictness};
use crate::services::statistics::RawStatistics;
use crate::services::{read_wav, ClassifyError, InferenceEngine};

impl SamplingOrchestrator {
    pub(super) async fn phase_measure(
        &self,
        run: &mut RunAccumulator,
        engine: &mut dyn InferenceEngine,
        captured: CapturedSample,
    ) -> MonitorResult<Sample> {
        let strict = self.config.run.strictness == Strictness::Strict;
        let wav = captured.artifact.with_extension("wav");

        run.transition_to(RunState::Converting);
        let converted = self
            .services
            .tools
            .convert(&captured.artifact, &wav, self.config.run.convert_sample_rate)
            .await;

        if let Err(e) = converted {
            self.remove_pcm(&wav).await;
            if strict {
                return Err(MonitorError::Conversion(e));
            }
            tracing::warn!(
                run_id = %run.run_id,
                index = captured.index,
                error = %e,
                "Conversion failed, continuing with empty measurements"
            );
            run.transition_to(RunState::Measuring);
            return Ok(self.build_sample(captured, &RawStatistics::default(), None));
        }

        run.transition_to(RunState::Measuring);

        let stats = match self.services.statistics.statistics(&wav).await {
            Ok(stats) => stats,
            Err(e) if strict => {
                self.remove_pcm(&wav).await;
                return Err(MonitorError::Statistics(e.to_string()));
            }
            Err(e) => {
                tracing::warn!(
                    run_id = %run.run_id,
                    index = captured.index,
                    error = %e,
                    "Statistics failed, defaulting to zero"
                );
                RawStatistics::default()
            }
        };

        let classification = match self.classify(engine, &wav).await {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::warn!(
                    run_id = %run.run_id,
                    index = captured.index,
                    error = %e,
                    "Classification failed, sample has no label"
                );
                None
            }
        };

        if !self.config.tools.keep_pcm {
            self.remove_pcm(&wav).await;
        }

        let sample = self.build_sample(captured, &stats, classification);

        tracing::info!(
            run_id = %run.run_id,
            index = sample.index,
            label = sample.label().unwrap_or("-"),
            confidence = sample.classification.as_ref().map(|c| c.confidence).unwrap_or(0.0),
            loudness_db = sample.features.loudness_db,
            rms = sample.features.rms_amplitude,
            "Sample measured"
        );

        Ok(sample)
    }

    async fn classify(
        &self,
        engine: &mut dyn InferenceEngine,
        wav: &Path,
    ) -> Result<ClassificationResult, ClassifyError> {
        let path = wav.to_path_buf();
        let pcm = tokio::task::spawn_blocking(move || read_wav(&path))
            .await
            .map_err(|e| ClassifyError::Decode(e.to_string()))?
            .map_err(|e| ClassifyError::Decode(e.to_string()))?;

        self.classifier.classify(engine, &pcm).await
    }

    fn build_sample(
        &self,
        captured: CapturedSample,
        stats: &RawStatistics,
        classification: Option<ClassificationResult>,
    ) -> Sample {
        Sample {
            index: captured.index,
            captured_at: captured.captured_at,
            artifact: captured.artifact,
            features: self.extractor.extract(stats),
            classification,
        }
    }

    async fn remove_pcm(&self, wav: &Path) {
        match tokio::fs::remove_file(wav).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(wav = %wav.display(), error = %e, "Failed to remove PCM file"),
        }
    }
}
