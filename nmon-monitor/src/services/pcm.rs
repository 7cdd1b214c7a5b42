//! 16-bit PCM WAV decoding
//!
//! Multi-channel input is downmixed to mono by averaging frames.

use std::path::Path;
use thiserror::Error;

/// PCM decoding errors
#[derive(Debug, Error)]
pub enum PcmError {
    #[error("Failed to read WAV {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: hound::Error,
    },

    /// Only signed 16-bit integer samples are accepted
    #[error("Unsupported WAV format: {0}")]
    UnsupportedFormat(String),
}

/// Decoded mono PCM
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    /// Channel count of the source file before downmix
    pub source_channels: u16,
}

impl PcmBuffer {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Samples normalized to [-1.0, 1.0]
    pub fn normalized(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|&s| s as f64 / 32768.0)
    }
}

/// Read a 16-bit PCM WAV file into a mono buffer
pub fn read_wav(path: &Path) -> Result<PcmBuffer, PcmError> {
    let read_err = |source| PcmError::Read {
        path: path.display().to_string(),
        source,
    };

    let mut reader = hound::WavReader::open(path).map_err(read_err)?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(PcmError::UnsupportedFormat(format!(
            "{:?} {}-bit",
            spec.sample_format, spec.bits_per_sample
        )));
    }
    if spec.channels == 0 {
        return Err(PcmError::UnsupportedFormat("zero channels".to_string()));
    }

    let interleaved = reader
        .samples::<i16>()
        .collect::<Result<Vec<i16>, _>>()
        .map_err(read_err)?;

    let samples = if spec.channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(spec.channels as usize)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / frame.len() as i32) as i16
            })
            .collect()
    };

    tracing::debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        frames = samples.len(),
        "Decoded PCM"
    );

    Ok(PcmBuffer {
        samples,
        sample_rate: spec.sample_rate,
        source_channels: spec.channels,
    })
}
