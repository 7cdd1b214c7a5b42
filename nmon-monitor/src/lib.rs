//! nmon-monitor library interface
//!
//! Exposes the sampling orchestrator and its collaborators for the binary and
//! for integration tests.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;

pub use crate::config::{CliOverrides, MonitorConfig, MonitorToml};
pub use crate::error::{MonitorError, MonitorResult};
