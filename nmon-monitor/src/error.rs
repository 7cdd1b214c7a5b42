//! Error types for nmon-monitor
//!
//! Collaborator-specific errors (`ToolError`, `EngineError`, `StoreError`,
//! `ClassifyError`) live next to the services that raise them. `MonitorError`
//! is what a run returns. Classification failures never surface here; they
//! leave the sample unlabeled.

use thiserror::Error;

use crate::services::{EngineError, StoreError, ToolError};

/// Run-level error type
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Invalid or incomplete configuration (aborts before sampling)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Capture utility failed or overran its deadline
    #[error("Capture failed: {0}")]
    Capture(#[source] ToolError),

    /// PCM conversion failed (fatal only in strict mode)
    #[error("Conversion failed: {0}")]
    Conversion(#[source] ToolError),

    /// Statistics extraction failed (fatal only in strict mode)
    #[error("Statistics failed: {0}")]
    Statistics(String),

    /// Clip concatenation failed (fatal only in strict mode)
    #[error("Concatenation failed: {0}")]
    Concatenation(#[source] ToolError),

    /// Inference engine could not be loaded
    #[error("Model load failed: {0}")]
    ModelLoad(#[from] EngineError),

    /// Measurement records could not be persisted
    #[error("Measurement store error: {0}")]
    Store(#[from] StoreError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// nmon-common error
    #[error("Common error: {0}")]
    Common(#[from] nmon_common::Error),
}

/// Result type for nmon-monitor
pub type MonitorResult<T> = std::result::Result<T, MonitorError>;
