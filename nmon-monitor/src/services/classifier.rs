//! Sliding-window classification of one sample
//!
//! The buffer is cut into windows of the model's input length with a stride of
//! `floor(window * overlap)` (minimum 1). A trailing partial window is dropped.
//! Per-label scores are averaged over all windows, counting an absent label
//! as 0, and the highest mean wins. Ties go to the label listed first by the
//! model.

use std::collections::HashMap;
use thiserror::Error;

use crate::models::ClassificationResult;
use crate::services::inference::{EngineError, InferenceEngine};
use crate::services::pcm::PcmBuffer;

/// Classification errors
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Buffer shorter than one model window
    #[error("No inference window fits: {samples} samples, window of {window}")]
    NoWindowsFit { samples: usize, window: usize },

    #[error("Sample rate mismatch: model expects {expected} Hz, audio is {actual} Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },

    /// Model reported an empty label set
    #[error("Model has no labels")]
    NoLabels,

    /// PCM file could not be decoded
    #[error("Failed to decode PCM: {0}")]
    Decode(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Sliding-window classifier
#[derive(Debug, Clone)]
pub struct SlidingWindowClassifier {
    overlap: f64,
}

impl SlidingWindowClassifier {
    pub fn new(overlap: f64) -> Self {
        Self { overlap }
    }

    pub async fn classify(
        &self,
        engine: &mut dyn InferenceEngine,
        pcm: &PcmBuffer,
    ) -> Result<ClassificationResult, ClassifyError> {
        let info = engine.model_info().clone();

        if pcm.sample_rate != info.sample_rate {
            return Err(ClassifyError::SampleRateMismatch {
                expected: info.sample_rate,
                actual: pcm.sample_rate,
            });
        }

        let offsets = window_offsets(pcm.len(), info.window_len, self.overlap);
        if offsets.is_empty() {
            return Err(ClassifyError::NoWindowsFit {
                samples: pcm.len(),
                window: info.window_len,
            });
        }

        let mut window_scores = Vec::with_capacity(offsets.len());
        for offset in &offsets {
            let window = &pcm.samples[*offset..*offset + info.window_len];
            window_scores.push(engine.classify_window(window).await?);
        }

        let result = aggregate(&info.labels, &window_scores).ok_or(ClassifyError::NoLabels)?;

        tracing::debug!(
            windows = offsets.len(),
            label = %result.label,
            confidence = result.confidence,
            "Sample classified"
        );

        Ok(result)
    }
}

/// Start offsets of every full window
pub fn window_offsets(len: usize, window: usize, overlap: f64) -> Vec<usize> {
    if window == 0 || len < window {
        return Vec::new();
    }
    let stride = ((window as f64 * overlap).floor() as usize).max(1);
    (0..=len - window).step_by(stride).collect()
}

/// Mean score per label over all windows; highest mean wins, first label on ties
///
/// Returns None when `labels` is empty.
pub fn aggregate(
    labels: &[String],
    window_scores: &[HashMap<String, f64>],
) -> Option<ClassificationResult> {
    if window_scores.is_empty() {
        return None;
    }
    let count = window_scores.len() as f64;

    let mut best: Option<ClassificationResult> = None;
    for label in labels {
        let total: f64 = window_scores
            .iter()
            .map(|scores| scores.get(label).copied().unwrap_or(0.0))
            .sum();
        let mean = total / count;

        // strict > keeps the earlier label on ties
        if best.as_ref().map_or(true, |b| mean > b.confidence) {
            best = Some(ClassificationResult {
                label: label.clone(),
                confidence: mean,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::inference::ModelInfo;

    fn scores(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(l, s)| (l.to_string(), *s)).collect()
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_offsets_quarter_overlap() {
        // window 4, stride 1
        assert_eq!(window_offsets(6, 4, 0.25), vec![0, 1, 2]);
        // window 8, stride 2; trailing partial window dropped
        assert_eq!(window_offsets(13, 8, 0.25), vec![0, 2, 4]);
    }

    #[test]
    fn test_offsets_exact_fit_and_too_short() {
        assert_eq!(window_offsets(16000, 16000, 0.25), vec![0]);
        assert!(window_offsets(15999, 16000, 0.25).is_empty());
        assert!(window_offsets(10, 0, 0.25).is_empty());
    }

    #[test]
    fn test_offsets_minimum_stride() {
        assert_eq!(window_offsets(5, 3, 0.1), vec![0, 1, 2]);
        assert_eq!(window_offsets(8, 4, 1.0), vec![0, 4]);
    }

    #[test]
    fn test_aggregate_mean_with_absent_labels() {
        let windows = vec![
            scores(&[("A", 0.9), ("B", 0.1)]),
            scores(&[("B", 0.6)]),
            scores(&[("A", 0.6), ("B", 0.2)]),
        ];
        let result = aggregate(&labels(&["A", "B"]), &windows).unwrap();
        assert_eq!(result.label, "A");
        assert!((result.confidence - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_aggregate_tie_goes_to_first_label() {
        let windows = vec![scores(&[("A", 0.5), ("B", 0.5)])];
        assert_eq!(aggregate(&labels(&["A", "B"]), &windows).unwrap().label, "A");
        assert_eq!(aggregate(&labels(&["B", "A"]), &windows).unwrap().label, "B");
    }

    #[test]
    fn test_aggregate_ignores_unknown_labels() {
        let windows = vec![scores(&[("X", 1.0), ("A", 0.2)])];
        let result = aggregate(&labels(&["A", "B"]), &windows).unwrap();
        assert_eq!(result.label, "A");
        assert_eq!(result.confidence, 0.2);
    }

    #[test]
    fn test_aggregate_empty_inputs() {
        assert!(aggregate(&[], &[scores(&[("A", 1.0)])]).is_none());
        assert!(aggregate(&labels(&["A"]), &[]).is_none());
    }

    /// Engine that scores each window by its first sample value and records
    /// what it was asked to classify
    struct OffsetEngine {
        info: ModelInfo,
        seen: Vec<(i16, usize)>,
    }

    impl OffsetEngine {
        fn new(window_len: usize) -> Self {
            Self {
                info: ModelInfo {
                    window_len,
                    sample_rate: 16000,
                    labels: labels(&["A", "B"]),
                },
                seen: Vec::new(),
            }
        }
    }

    #[async_trait::async_trait]
    impl InferenceEngine for OffsetEngine {
        fn model_info(&self) -> &ModelInfo {
            &self.info
        }

        async fn classify_window(
            &mut self,
            window: &[i16],
        ) -> Result<HashMap<String, f64>, EngineError> {
            self.seen.push((window[0], window.len()));
            Ok(match window[0] {
                0 => scores(&[("A", 0.75), ("B", 0.25)]),
                2 => scores(&[("A", 0.25), ("B", 0.75)]),
                _ => scores(&[("A", 0.5)]),
            })
        }
    }

    /// Samples equal to their own index, so a window's first value is its offset
    fn ramp(len: usize, sample_rate: u32) -> PcmBuffer {
        PcmBuffer {
            samples: (0..len as i16).collect(),
            sample_rate,
            source_channels: 1,
        }
    }

    #[tokio::test]
    async fn test_classify_slides_over_full_windows() {
        let mut engine = OffsetEngine::new(8);
        let result = SlidingWindowClassifier::new(0.25)
            .classify(&mut engine, &ramp(13, 16000))
            .await
            .unwrap();

        assert_eq!(engine.seen, vec![(0, 8), (2, 8), (4, 8)]);
        // A: (0.75 + 0.25 + 0.5) / 3, B: (0.25 + 0.75 + 0) / 3
        assert_eq!(result.label, "A");
        assert!((result.confidence - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_classify_buffer_shorter_than_window() {
        let mut engine = OffsetEngine::new(8);
        let err = SlidingWindowClassifier::new(0.25)
            .classify(&mut engine, &ramp(7, 16000))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClassifyError::NoWindowsFit {
                samples: 7,
                window: 8
            }
        ));
        assert!(engine.seen.is_empty());
    }

    #[tokio::test]
    async fn test_classify_rejects_sample_rate_mismatch() {
        let mut engine = OffsetEngine::new(8);
        let err = SlidingWindowClassifier::new(0.25)
            .classify(&mut engine, &ramp(16, 44100))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClassifyError::SampleRateMismatch {
                expected: 16000,
                actual: 44100
            }
        ));
        assert!(engine.seen.is_empty());
    }
}
