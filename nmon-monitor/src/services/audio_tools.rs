//! Audio capture, conversion, concatenation and enhancement
//!
//! Production wraps ffmpeg and sox. The orchestrator only sees the
//! `AudioTools` trait so tests can substitute scripted tools.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::MonitorConfig;
use crate::services::process::{run_tool, ToolError};

/// One capture from the input device
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub device: String,
    pub channels: u16,
    pub sample_rate: u32,
    pub duration: Duration,
}

/// External audio utilities used by a sampling run
#[async_trait]
pub trait AudioTools: Send + Sync {
    /// Record `request.duration` of audio into a compressed file at `out`
    async fn capture(&self, request: &CaptureRequest, out: &Path) -> Result<(), ToolError>;

    /// Decode `input` into 16-bit PCM WAV, optionally resampling
    async fn convert(
        &self,
        input: &Path,
        out: &Path,
        sample_rate: Option<u32>,
    ) -> Result<(), ToolError>;

    /// Start the run clip as a stream copy of the first passing sample
    async fn seed_clip(&self, source: &Path, clip: &Path) -> Result<(), ToolError>;

    /// Append `next` onto the end of `clip`
    async fn append_clip(&self, clip: &Path, next: &Path) -> Result<(), ToolError>;

    /// Noise-reduce and normalize `input` into `out`
    async fn enhance(&self, input: &Path, out: &Path, noise_profile: &Path)
        -> Result<(), ToolError>;
}

/// ffmpeg/sox backed tools
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    ffmpeg: String,
    sox: String,
    /// Added to the requested capture duration
    grace: Duration,
    /// Conversion bound (sample duration + grace)
    convert_deadline: Duration,
    /// Concatenation and enhancement bound
    tool_deadline: Duration,
}

impl FfmpegTools {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            ffmpeg: config.tools.ffmpeg.clone(),
            sox: config.tools.sox.clone(),
            grace: Duration::from_secs(config.tools.grace_secs),
            convert_deadline: config.capture_deadline(),
            tool_deadline: config.tool_deadline(),
        }
    }

    /// Sibling temp path used while appending to `clip`
    fn temp_clip_path(clip: &Path) -> PathBuf {
        let name = clip
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip.mp3".to_string());
        clip.with_file_name(format!("temp_{}", name))
    }
}

pub(crate) fn capture_args(request: &CaptureRequest, out: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        "alsa".into(),
        "-channels".into(),
        request.channels.to_string(),
        "-sample_rate".into(),
        request.sample_rate.to_string(),
        "-i".into(),
        request.device.clone(),
        "-t".into(),
        request.duration.as_secs().to_string(),
        "-acodec".into(),
        "libmp3lame".into(),
        "-q:a".into(),
        "2".into(),
        out.display().to_string(),
    ]
}

pub(crate) fn convert_args(input: &Path, out: &Path, sample_rate: Option<u32>) -> Vec<String> {
    let mut args = vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        input.display().to_string(),
        "-acodec".into(),
        "pcm_s16le".into(),
    ];
    if let Some(rate) = sample_rate {
        args.push("-ar".into());
        args.push(rate.to_string());
    }
    args.push(out.display().to_string());
    args
}

pub(crate) fn enhance_args(input: &Path, out: &Path, noise_profile: &Path) -> Vec<String> {
    let mut args = vec![
        input.display().to_string(),
        out.display().to_string(),
        "noisered".into(),
        noise_profile.display().to_string(),
        "0.3".into(),
    ];
    args.extend(
        [
            "highpass", "100", "lowpass", "10000", "compand", "0.3,1", "6:-70,-60,-20", "-5",
            "-90", "0.2", "norm", "-3",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args
}

#[async_trait]
impl AudioTools for FfmpegTools {
    async fn capture(&self, request: &CaptureRequest, out: &Path) -> Result<(), ToolError> {
        tracing::info!(
            device = %request.device,
            duration_secs = request.duration.as_secs(),
            output = %out.display(),
            "Capturing audio sample"
        );
        run_tool(&self.ffmpeg, capture_args(request, out), request.duration + self.grace).await?;
        Ok(())
    }

    async fn convert(
        &self,
        input: &Path,
        out: &Path,
        sample_rate: Option<u32>,
    ) -> Result<(), ToolError> {
        run_tool(&self.ffmpeg, convert_args(input, out, sample_rate), self.convert_deadline).await?;
        tracing::debug!(input = %input.display(), output = %out.display(), "Converted to PCM WAV");
        Ok(())
    }

    async fn seed_clip(&self, source: &Path, clip: &Path) -> Result<(), ToolError> {
        let args = [
            "-y".to_string(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            source.display().to_string(),
            "-c".into(),
            "copy".into(),
            clip.display().to_string(),
        ];
        run_tool(&self.ffmpeg, args, self.tool_deadline).await?;
        tracing::debug!(clip = %clip.display(), "Seeded run clip");
        Ok(())
    }

    async fn append_clip(&self, clip: &Path, next: &Path) -> Result<(), ToolError> {
        let temp = Self::temp_clip_path(clip);
        let args = [
            "-y".to_string(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            format!("concat:{}|{}", clip.display(), next.display()),
            "-c".into(),
            "copy".into(),
            temp.display().to_string(),
        ];

        if let Err(e) = run_tool(&self.ffmpeg, args, self.tool_deadline).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }

        tokio::fs::rename(&temp, clip).await?;

        tracing::debug!(clip = %clip.display(), appended = %next.display(), "Appended sample to clip");
        Ok(())
    }

    async fn enhance(
        &self,
        input: &Path,
        out: &Path,
        noise_profile: &Path,
    ) -> Result<(), ToolError> {
        run_tool(&self.sox, enhance_args(input, out, noise_profile), self.tool_deadline).await?;
        tracing::info!(input = %input.display(), output = %out.display(), "Enhanced detection clip");
        Ok(())
    }
}
