//! Remote archive hand-off
//!
//! Uploads are best-effort. A failed upload is logged and the run carries on.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::services::process::run_tool;

/// Hands a finished artifact to a remote archive
#[async_trait]
pub trait ArtifactDispatcher: Send + Sync {
    /// Returns true when the upload succeeded
    async fn archive(&self, artifact: &Path) -> bool;
}

/// `rclone copy <file> <remote>`
#[derive(Debug, Clone)]
pub struct RcloneArchive {
    rclone: String,
    remote: String,
    timeout: Duration,
}

impl RcloneArchive {
    pub fn new(rclone: impl Into<String>, remote: impl Into<String>, timeout: Duration) -> Self {
        Self {
            rclone: rclone.into(),
            remote: remote.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ArtifactDispatcher for RcloneArchive {
    async fn archive(&self, artifact: &Path) -> bool {
        let args = [
            "copy".to_string(),
            artifact.display().to_string(),
            self.remote.clone(),
        ];

        match run_tool(&self.rclone, args, self.timeout).await {
            Ok(_) => {
                tracing::info!(
                    artifact = %artifact.display(),
                    remote = %self.remote,
                    "Artifact archived"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    artifact = %artifact.display(),
                    remote = %self.remote,
                    error = %e,
                    "Archive upload failed"
                );
                false
            }
        }
    }
}
