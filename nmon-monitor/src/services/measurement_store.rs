//! Append-only CSV measurement log
//!
//! Records go to the lexicographically last `noise-monitor_records_*.csv` in
//! the record directory. When none exists a new file named after the current
//! minute is started. The header is written only into a new or empty file.

use chrono::Local;
use nmon_common::time::record_file_timestamp;
use nmon_common::Clock;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::models::MeasurementRecord;

/// Record file name prefix
pub const RECORD_FILE_PREFIX: &str = "noise-monitor_records_";
const RECORD_FILE_EXTENSION: &str = ".csv";

/// Measurement store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create record directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Record file I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write record: {0}")]
    Csv(#[from] csv::Error),
}

/// Durable sink for per-sample records
pub trait MeasurementStore: Send + Sync {
    /// Append `records` in order; returns the file written, or None for an
    /// empty batch
    fn append(&self, records: &[MeasurementRecord]) -> Result<Option<PathBuf>, StoreError>;
}

/// CSV file store
pub struct CsvMeasurementStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl CsvMeasurementStore {
    pub fn new(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            clock,
        }
    }

    /// Existing record file to append to, if any
    fn latest_record_file(&self) -> Result<Option<PathBuf>, StoreError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.display().to_string(),
            source,
        })?;

        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| is_record_file_name(name))
            .collect();
        names.sort();

        Ok(names.pop().map(|name| self.dir.join(name)))
    }

    fn new_record_file(&self) -> PathBuf {
        let now: chrono::DateTime<Local> = self.clock.now();
        self.dir.join(format!(
            "{}{}{}",
            RECORD_FILE_PREFIX,
            record_file_timestamp(&now),
            RECORD_FILE_EXTENSION
        ))
    }
}

fn is_record_file_name(name: &str) -> bool {
    name.starts_with(RECORD_FILE_PREFIX) && name.ends_with(RECORD_FILE_EXTENSION)
}

fn is_empty_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true)
}

impl MeasurementStore for CsvMeasurementStore {
    fn append(&self, records: &[MeasurementRecord]) -> Result<Option<PathBuf>, StoreError> {
        if records.is_empty() {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::CreateDir {
            path: self.dir.display().to_string(),
            source,
        })?;

        let path = match self.latest_record_file()? {
            Some(existing) => existing,
            None => self.new_record_file(),
        };
        let write_header = is_empty_file(&path);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StoreError::Io {
                path: path.display().to_string(),
                source,
            })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush().map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;

        tracing::info!(
            file = %path.display(),
            records = records.len(),
            header_written = write_header,
            "Measurement records appended"
        );

        Ok(Some(path))
    }
}
