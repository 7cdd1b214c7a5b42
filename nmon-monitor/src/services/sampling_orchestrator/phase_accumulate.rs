//! DECIDING → ACCUMULATING
//!
//! A sample keeps the run alive only if its label is in the passing set. The
//! first passing sample seeds the run clip; later ones are appended in
//! capture order.

use nmon_common::time::file_timestamp;
use tokio_util::sync::CancellationToken;

use super::SamplingOrchestrator;
use crate::error::{MonitorError, MonitorResult};
use crate::models::{ArchiveMode, RunAccumulator, RunState, Sample, Strictness};

impl SamplingOrchestrator {
    /// Record the sample and apply the passing-label policy
    ///
    /// Returns false when the run is now disqualified. A sample without a
    /// label disqualifies.
    pub(super) fn phase_decide(&self, run: &mut RunAccumulator, sample: Sample) -> bool {
        run.transition_to(RunState::Deciding);

        let passing = sample
            .label()
            .map(|label| self.config.run.is_passing(label))
            .unwrap_or(false);

        if !passing {
            tracing::info!(
                run_id = %run.run_id,
                index = sample.index,
                label = sample.label().unwrap_or("-"),
                "Sample outside passing labels, run disqualified"
            );
            run.disqualify();
        }

        run.push_sample(sample);
        passing
    }

    /// Merge the most recent sample into the run clip
    pub(super) async fn phase_accumulate(&self, run: &mut RunAccumulator) -> MonitorResult<()> {
        run.transition_to(RunState::Accumulating);

        let (source, first_at) = match (run.samples.last(), run.samples.first()) {
            (Some(last), Some(first)) => (last.artifact.clone(), first.captured_at),
            _ => return Ok(()),
        };

        let result = match run.artifact.clone() {
            None => {
                let clip = self
                    .config
                    .paths
                    .audio_dir
                    .join(format!("{}.mp3", file_timestamp(&first_at)));
                let seeded = self.services.tools.seed_clip(&source, &clip).await;
                if seeded.is_ok() {
                    run.artifact = Some(clip);
                }
                seeded
            }
            Some(clip) => self.services.tools.append_clip(&clip, &source).await,
        };

        if let Err(e) = result {
            if self.config.run.strictness == Strictness::Strict {
                return Err(MonitorError::Concatenation(e));
            }
            tracing::warn!(
                run_id = %run.run_id,
                sample = %source.display(),
                error = %e,
                "Concatenation failed, clip will miss this sample"
            );
        }

        if self.config.archive.mode == ArchiveMode::PerSample
            && self.services.archive.archive(&source).await
        {
            run.uploaded.push(source);
        }

        Ok(())
    }

    /// Sleep between samples; returns false when cancelled first
    pub(super) async fn wait_interval(&self, cancel: &CancellationToken) -> bool {
        let interval = self.config.run.sample_interval;
        tracing::debug!(?interval, "Waiting before next sample");

        tokio::select! {
            _ = tokio::time::sleep(interval) => true,
            _ = cancel.cancelled() => false,
        }
    }
}
