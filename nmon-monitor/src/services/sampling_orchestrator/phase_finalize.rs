//! FINALIZE_PASS / FINALIZE_FAIL → DISPATCHED

use std::path::PathBuf;

use super::SamplingOrchestrator;
use crate::models::{ArchiveMode, RunAccumulator, RunState};
use crate::services::StoreError;

impl SamplingOrchestrator {
    /// Enhance (optionally) and archive the run clip
    pub(super) async fn phase_finalize_pass(&self, run: &mut RunAccumulator) {
        run.transition_to(RunState::FinalizePass);

        let Some(clip) = run.artifact.clone() else {
            tracing::warn!(run_id = %run.run_id, "Qualifying run has no clip to archive");
            return;
        };

        let upload = if self.config.tools.enhance_detections {
            self.enhance_clip(&clip).await.unwrap_or(clip)
        } else {
            clip
        };

        if self.config.archive.mode == ArchiveMode::Concatenated
            && self.services.archive.archive(&upload).await
        {
            run.uploaded.push(upload);
        }
    }

    /// Enhanced copy in the detections directory, None on failure
    async fn enhance_clip(&self, clip: &std::path::Path) -> Option<PathBuf> {
        let dir = &self.config.paths.detections_dir;
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            tracing::warn!(dir = %dir.display(), error = %e, "Cannot create detections directory, archiving raw clip");
            return None;
        }

        let out = dir.join(clip.file_name()?);
        match self
            .services
            .tools
            .enhance(clip, &out, &self.config.paths.noise_profile_path)
            .await
        {
            Ok(()) => Some(out),
            Err(e) => {
                tracing::warn!(clip = %clip.display(), error = %e, "Enhancement failed, archiving raw clip");
                None
            }
        }
    }

    /// Drop the clip of a run that did not qualify
    pub(super) async fn phase_finalize_fail(&self, run: &mut RunAccumulator) {
        run.transition_to(RunState::FinalizeFail);

        if let Some(clip) = run.artifact.take() {
            match tokio::fs::remove_file(&clip).await {
                Ok(()) => tracing::info!(run_id = %run.run_id, clip = %clip.display(), "Discarded run clip"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(clip = %clip.display(), error = %e, "Failed to delete run clip")
                }
            }
        }
    }

    /// Persist records and report telemetry
    ///
    /// Telemetry is attempted even when the store fails; the store result is
    /// handed back for the caller to surface.
    pub(super) async fn phase_dispatch(
        &self,
        run: &mut RunAccumulator,
        qualified: bool,
    ) -> (Option<PathBuf>, f64, Result<(), StoreError>) {
        run.transition_to(RunState::Dispatched);

        let records = run.records();
        let (record_file, store_result) = match self.services.store.append(&records) {
            Ok(file) => (file, Ok(())),
            Err(e) => {
                tracing::error!(
                    run_id = %run.run_id,
                    records = records.len(),
                    error = %e,
                    "Failed to persist measurement records"
                );
                (None, Err(e))
            }
        };

        let sentinel = self.config.telemetry.no_signal_value;
        let value = if qualified {
            run.mean_loudness().unwrap_or(sentinel)
        } else {
            sentinel
        };
        self.services.telemetry.report(value).await;

        (record_file, value, store_result)
    }
}
