//! Per-sample feature extraction
//!
//! Turns raw statistics into a `FeatureSet`. Missing statistics default to
//! 0.0; day and time come from the injected clock.

use nmon_common::Clock;
use std::sync::Arc;

use crate::models::FeatureSet;
use crate::services::statistics::RawStatistics;

/// Offset added to the dBFS value so typical readings are positive
const LOUDNESS_OFFSET_DB: f64 = 100.0;

/// Feature extractor
pub struct FeatureExtractor {
    clock: Arc<dyn Clock>,
}

impl FeatureExtractor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn extract(&self, stats: &RawStatistics) -> FeatureSet {
        let rms = stats.rms_amplitude.unwrap_or(0.0);
        let max_amplitude = stats.max_amplitude.unwrap_or(0.0);
        let min_amplitude = stats.min_amplitude.unwrap_or(0.0);
        let now = self.clock.now();

        FeatureSet {
            rms_amplitude: rms,
            rough_frequency: stats.rough_frequency.unwrap_or(0.0),
            volume_adjustment: stats.volume_adjustment.unwrap_or(0.0),
            max_amplitude,
            min_amplitude,
            loudness_db: loudness_db(rms),
            peak: peak(max_amplitude, min_amplitude),
            day_of_week: now.format("%A").to_string(),
            time_of_day: now.format("%H:%M").to_string(),
        }
    }
}

/// `20 * log10(rms) + 100`, or 0.0 when rms is not a positive number
pub fn loudness_db(rms: f64) -> f64 {
    if rms > 0.0 && rms.is_finite() {
        20.0 * rms.log10() + LOUDNESS_OFFSET_DB
    } else {
        0.0
    }
}

pub fn peak(max_amplitude: f64, min_amplitude: f64) -> f64 {
    max_amplitude.abs().max(min_amplitude.abs())
}
