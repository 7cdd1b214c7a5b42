//! Inference engine seam
//!
//! The classifier drives an `InferenceEngine` one window at a time. Engines
//! are produced by a `ModelLoader` once per run.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Inference engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Model file absent
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    /// Runner process could not be started
    #[error("Failed to start model runner: {0}")]
    Spawn(#[source] std::io::Error),

    /// Runner socket never became available
    #[error("Model runner did not accept connections: {0}")]
    Connect(String),

    /// Malformed or unexpected runner message
    #[error("Model runner protocol error: {0}")]
    Protocol(String),

    /// Runner reported `success: false`
    #[error("Model runner error: {0}")]
    Remote(String),

    #[error("Model runner I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Static model description reported at load time
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    /// Samples per inference window
    pub window_len: usize,
    /// Expected PCM sample rate in Hz
    pub sample_rate: u32,
    /// Closed label set in model order
    pub labels: Vec<String>,
}

/// A loaded model
#[async_trait]
pub trait InferenceEngine: Send {
    fn model_info(&self) -> &ModelInfo;

    /// Score one window of exactly `window_len` samples
    async fn classify_window(&mut self, window: &[i16])
        -> Result<HashMap<String, f64>, EngineError>;
}

/// Loads a model file into a running engine
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, model_path: &Path) -> Result<Box<dyn InferenceEngine>, EngineError>;
}
