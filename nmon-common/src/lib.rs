//! # nmon common library
//!
//! Shared code for the noise monitor crates:
//! - Error type
//! - Bootstrap configuration loading (TOML, credentials file)
//! - Clock abstraction and timestamp formats

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
pub use time::{Clock, FixedClock, SystemClock};
