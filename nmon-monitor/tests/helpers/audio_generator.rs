//! Test WAV generation

use std::path::{Path, PathBuf};

/// Configuration for generated audio
#[derive(Debug, Clone)]
pub struct ToneConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per channel
    pub frames: usize,
    pub frequency_hz: f32,
    /// Peak amplitude, 0.0-1.0 of full scale
    pub amplitude: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            frames: 16000,
            frequency_hz: 440.0,
            amplitude: 0.3,
        }
    }
}

/// Write a 16-bit PCM sine tone
pub fn generate_tone_wav(path: &Path, config: &ToneConfig) -> anyhow::Result<PathBuf> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for i in 0..config.frames {
        let t = i as f32 / config.sample_rate as f32;
        let sample = (config.amplitude
            * (2.0 * std::f32::consts::PI * config.frequency_hz * t).sin()
            * i16::MAX as f32) as i16;
        for _ in 0..config.channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(path.to_path_buf())
}
