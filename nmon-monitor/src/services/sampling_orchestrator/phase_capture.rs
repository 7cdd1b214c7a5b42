//! CAPTURING
//!
//! Record one compressed sample from the input device into the audio
//! directory as `<timestamp>_<NN>.mp3`.

use chrono::{DateTime, Local};
use nmon_common::time::file_timestamp;
use std::path::PathBuf;

use super::SamplingOrchestrator;
use crate::error::{MonitorError, MonitorResult};
use crate::models::{RunAccumulator, RunState};
use crate::services::CaptureRequest;

/// Raw capture awaiting measurement
#[derive(Debug, Clone)]
pub(super) struct CapturedSample {
    pub index: usize,
    pub captured_at: DateTime<Local>,
    pub artifact: PathBuf,
}

impl SamplingOrchestrator {
    pub(super) async fn phase_capture(
        &self,
        run: &mut RunAccumulator,
        index: usize,
    ) -> MonitorResult<CapturedSample> {
        run.transition_to(RunState::Capturing);

        let captured_at = self.services.clock.now();
        let artifact = self
            .config
            .paths
            .audio_dir
            .join(format!("{}_{:02}.mp3", file_timestamp(&captured_at), index));

        let params = &self.config.run;
        let request = CaptureRequest {
            device: params.device.clone(),
            channels: params.channels,
            sample_rate: params.capture_sample_rate,
            duration: params.sample_duration,
        };

        tracing::info!(
            run_id = %run.run_id,
            index,
            of = params.sample_count,
            artifact = %artifact.display(),
            "Phase CAPTURING"
        );

        self.services
            .tools
            .capture(&request, &artifact)
            .await
            .map_err(MonitorError::Capture)?;

        Ok(CapturedSample {
            index,
            captured_at,
            artifact,
        })
    }
}
