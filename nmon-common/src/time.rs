//! Clock abstraction and timestamp formats

use chrono::{DateTime, Local};

/// `2024-03-04_09-05-00`, used for sample file names
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// `2024-03-04_09-05`, used for measurement log file names
pub const RECORD_FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M";

/// Wall-clock source
///
/// Injected wherever day/time fields or timestamped names are derived, so
/// tests can pin the time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Real local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock frozen at a fixed instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    instant: DateTime<Local>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Local>) -> Self {
        Self { instant }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.instant
    }
}

/// Format a timestamp for sample file names
pub fn file_timestamp(at: &DateTime<Local>) -> String {
    at.format(FILE_TIMESTAMP_FORMAT).to_string()
}

/// Format a timestamp for measurement log file names
pub fn record_file_timestamp(at: &DateTime<Local>) -> String {
    at.format(RECORD_FILE_TIMESTAMP_FORMAT).to_string()
}

/// Convert whole seconds to a duration
pub fn secs_to_duration(secs: u64) -> std::time::Duration {
    std::time::Duration::from_secs(secs)
}
