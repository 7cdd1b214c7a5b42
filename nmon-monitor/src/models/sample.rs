//! Per-sample measurements
//!
//! A `Sample` is one capture-classify cycle. Its `FeatureSet` and optional
//! `ClassificationResult` are flattened into a `MeasurementRecord` when the run
//! is dispatched.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Scalar statistics of one sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub rms_amplitude: f64,
    pub rough_frequency: f64,
    pub volume_adjustment: f64,
    pub max_amplitude: f64,
    pub min_amplitude: f64,
    /// `20 * log10(rms) + 100`, or exactly 0 when rms is not positive
    pub loudness_db: f64,
    /// `max(|max_amplitude|, |min_amplitude|)`
    pub peak: f64,
    /// English weekday name, e.g. "Monday"
    pub day_of_week: String,
    /// Local wall-clock time as `HH:MM`
    pub time_of_day: String,
}

/// Best label of one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    /// Mean score of `label` across all inference windows (0.0-1.0)
    pub confidence: f64,
}

/// One capture attempt within a run
#[derive(Debug, Clone)]
pub struct Sample {
    /// 1-based ordinal within the run
    pub index: usize,
    pub captured_at: DateTime<Local>,
    /// Raw compressed capture
    pub artifact: PathBuf,
    pub features: FeatureSet,
    /// None when classification failed for this sample
    pub classification: Option<ClassificationResult>,
}

impl Sample {
    pub fn label(&self) -> Option<&str> {
        self.classification.as_ref().map(|c| c.label.as_str())
    }

    /// Flatten into the persisted row
    pub fn to_record(&self) -> MeasurementRecord {
        let f = &self.features;
        let (label, confidence) = match &self.classification {
            Some(c) => (c.label.clone(), c.confidence),
            None => (String::new(), 0.0),
        };

        MeasurementRecord {
            rms_amplitude: f.rms_amplitude,
            rough_frequency: f.rough_frequency,
            volume_adjustment: f.volume_adjustment,
            max_amplitude: f.max_amplitude,
            min_amplitude: f.min_amplitude,
            loudness_db: f.loudness_db,
            peak: f.peak,
            day_of_week: f.day_of_week.clone(),
            time_of_day: f.time_of_day.clone(),
            label,
            confidence,
            file: self.artifact.display().to_string(),
        }
    }
}

/// One row of the measurement log
///
/// Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub rms_amplitude: f64,
    pub rough_frequency: f64,
    pub volume_adjustment: f64,
    pub max_amplitude: f64,
    pub min_amplitude: f64,
    pub loudness_db: f64,
    pub peak: f64,
    pub day_of_week: String,
    pub time_of_day: String,
    pub label: String,
    pub confidence: f64,
    pub file: String,
}
