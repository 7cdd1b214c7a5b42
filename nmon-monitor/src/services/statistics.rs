//! Signal statistics sources
//!
//! `SoxStatistics` parses the `sox <wav> -n stat` report; `PcmStatistics`
//! computes the same fields from the decoded samples. Fields the source cannot
//! produce stay `None` and are defaulted by the feature extractor.

use async_trait::async_trait;
use regex::Regex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

use crate::services::pcm::{read_wav, PcmBuffer, PcmError};
use crate::services::process::{run_tool, ToolError};

/// Statistics errors
#[derive(Debug, Error)]
pub enum StatisticsError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Pcm(#[from] PcmError),

    #[error("Statistics task failed: {0}")]
    Task(String),
}

/// Raw per-sample statistics; any field may be missing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStatistics {
    pub rms_amplitude: Option<f64>,
    pub rough_frequency: Option<f64>,
    pub volume_adjustment: Option<f64>,
    pub max_amplitude: Option<f64>,
    pub min_amplitude: Option<f64>,
}

/// Produces statistics for a PCM WAV file
#[async_trait]
pub trait StatisticsSource: Send + Sync {
    async fn statistics(&self, wav: &Path) -> Result<RawStatistics, StatisticsError>;
}

/// `sox <wav> -n stat` backed source
#[derive(Debug, Clone)]
pub struct SoxStatistics {
    sox: String,
    deadline: Duration,
}

impl SoxStatistics {
    pub fn new(sox: impl Into<String>, deadline: Duration) -> Self {
        Self {
            sox: sox.into(),
            deadline,
        }
    }
}

#[async_trait]
impl StatisticsSource for SoxStatistics {
    async fn statistics(&self, wav: &Path) -> Result<RawStatistics, StatisticsError> {
        let args = [wav.as_os_str(), OsStr::new("-n"), OsStr::new("stat")];
        let output = run_tool(&self.sox, args, self.deadline).await?;

        // sox writes the stat report to stderr
        let report = String::from_utf8_lossy(&output.stderr);
        let stats = parse_sox_stat(&report);

        tracing::debug!(wav = %wav.display(), ?stats, "sox statistics");
        Ok(stats)
    }
}

struct StatPatterns {
    rms: Regex,
    frequency: Regex,
    volume: Regex,
    maximum: Regex,
    minimum: Regex,
}

fn stat_patterns() -> &'static StatPatterns {
    static PATTERNS: OnceLock<StatPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let field = |label: &str| {
            Regex::new(&format!(r"{}:\s*([-+]?[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?)", label))
                .expect("sox stat regex should compile")
        };
        StatPatterns {
            rms: field(r"RMS\s+amplitude"),
            frequency: field(r"Rough\s+frequency"),
            volume: field(r"Volume\s+adjustment"),
            maximum: field(r"Maximum\s+amplitude"),
            minimum: field(r"Minimum\s+amplitude"),
        }
    })
}

/// Extract the labeled fields from a sox stat report
pub fn parse_sox_stat(report: &str) -> RawStatistics {
    let patterns = stat_patterns();
    let capture = |re: &Regex| {
        re.captures(report)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    };

    RawStatistics {
        rms_amplitude: capture(&patterns.rms),
        rough_frequency: capture(&patterns.frequency),
        volume_adjustment: capture(&patterns.volume),
        max_amplitude: capture(&patterns.maximum),
        min_amplitude: capture(&patterns.minimum),
    }
}

/// In-process statistics over the decoded WAV
#[derive(Debug, Clone, Default)]
pub struct PcmStatistics;

impl PcmStatistics {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StatisticsSource for PcmStatistics {
    async fn statistics(&self, wav: &Path) -> Result<RawStatistics, StatisticsError> {
        let path: PathBuf = wav.to_path_buf();
        let pcm = tokio::task::spawn_blocking(move || read_wav(&path))
            .await
            .map_err(|e| StatisticsError::Task(e.to_string()))??;
        Ok(compute_statistics(&pcm))
    }
}

/// Amplitude statistics on the [-1, 1] scale
///
/// Rough frequency is estimated from the zero-crossing rate. Volume adjustment
/// is `1/peak` and absent for digital silence.
pub fn compute_statistics(pcm: &PcmBuffer) -> RawStatistics {
    if pcm.is_empty() {
        return RawStatistics::default();
    }

    let mut sum_sq = 0.0;
    let mut max = f64::MIN;
    let mut min = f64::MAX;
    let mut crossings = 0usize;
    let mut prev: Option<f64> = None;

    for x in pcm.normalized() {
        sum_sq += x * x;
        max = max.max(x);
        min = min.min(x);
        if let Some(p) = prev {
            if (p < 0.0 && x >= 0.0) || (p >= 0.0 && x < 0.0) {
                crossings += 1;
            }
        }
        prev = Some(x);
    }

    let rms = (sum_sq / pcm.len() as f64).sqrt();
    let duration = pcm.duration_secs();
    let rough_frequency = if duration > 0.0 {
        Some((crossings as f64 / (2.0 * duration)).round())
    } else {
        None
    };
    let peak = max.abs().max(min.abs());

    RawStatistics {
        rms_amplitude: Some(rms),
        rough_frequency,
        volume_adjustment: (peak > 0.0).then(|| 1.0 / peak),
        max_amplitude: Some(max),
        min_amplitude: Some(min),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOX_REPORT: &str = "\
Samples read:            441000
Length (seconds):     10.000000
Scaled by:         2147483647.0
Maximum amplitude:     0.512345
Minimum amplitude:    -0.498765
Midline amplitude:     0.006790
Mean    norm:          0.041234
Mean    amplitude:     0.000012
RMS     amplitude:     0.061234
Maximum delta:         0.412345
Minimum delta:         0.000000
Mean    delta:         0.012345
RMS     delta:         0.019876
Rough   frequency:          543
Volume adjustment:        1.952
";

    #[test]
    fn test_parse_full_report() {
        let stats = parse_sox_stat(SOX_REPORT);
        assert_eq!(stats.rms_amplitude, Some(0.061234));
        assert_eq!(stats.rough_frequency, Some(543.0));
        assert_eq!(stats.volume_adjustment, Some(1.952));
        assert_eq!(stats.max_amplitude, Some(0.512345));
        assert_eq!(stats.min_amplitude, Some(-0.498765));
    }

    #[test]
    fn test_parse_partial_report() {
        let stats = parse_sox_stat("RMS     amplitude:     0.25\nsox WARN stat: something odd\n");
        assert_eq!(stats.rms_amplitude, Some(0.25));
        assert_eq!(stats.rough_frequency, None);
        assert_eq!(stats.volume_adjustment, None);
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_sox_stat("sox FAIL formats"), RawStatistics::default());
    }

    #[test]
    fn test_compute_square_wave() {
        // 100 Hz square wave at 8 kHz, half scale
        let period = 80;
        let samples: Vec<i16> = (0..8000)
            .map(|i| if (i % period) < period / 2 { 16384 } else { -16384 })
            .collect();
        let pcm = PcmBuffer {
            samples,
            sample_rate: 8000,
            source_channels: 1,
        };

        let stats = compute_statistics(&pcm);
        assert!((stats.rms_amplitude.unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(stats.max_amplitude, Some(0.5));
        assert_eq!(stats.min_amplitude, Some(-0.5));
        assert_eq!(stats.volume_adjustment, Some(2.0));
        assert_eq!(stats.rough_frequency, Some(100.0));
    }

    #[test]
    fn test_compute_silence() {
        let pcm = PcmBuffer {
            samples: vec![0; 1000],
            sample_rate: 8000,
            source_channels: 1,
        };
        let stats = compute_statistics(&pcm);
        assert_eq!(stats.rms_amplitude, Some(0.0));
        assert_eq!(stats.volume_adjustment, None);
    }

    #[test]
    fn test_compute_empty() {
        let pcm = PcmBuffer {
            samples: vec![],
            sample_rate: 8000,
            source_channels: 1,
        };
        assert_eq!(compute_statistics(&pcm), RawStatistics::default());
    }
}
