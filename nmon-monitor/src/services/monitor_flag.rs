//! On/off flag file
//!
//! The first line, trimmed and compared case-insensitively, must read `on` for
//! a run to sample. A missing file is created with `on` so a fresh install
//! starts enabled.

use std::io::ErrorKind;
use std::path::PathBuf;

const ENABLED: &str = "on";

/// Persisted enable flag, read once per run
#[derive(Debug, Clone)]
pub struct MonitorFlag {
    path: PathBuf,
}

impl MonitorFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn is_enabled(&self) -> bool {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let first = content.lines().next().unwrap_or("").trim();
                let enabled = first.eq_ignore_ascii_case(ENABLED);
                if !enabled {
                    tracing::info!(flag = %self.path.display(), value = %first, "Monitoring disabled by flag file");
                }
                enabled
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.create_enabled();
                true
            }
            Err(e) => {
                tracing::error!(flag = %self.path.display(), error = %e, "Cannot read flag file, treating as disabled");
                false
            }
        }
    }

    fn create_enabled(&self) {
        let result = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
            _ => Ok(()),
        }
        .and_then(|_| std::fs::write(&self.path, format!("{}\n", ENABLED)));

        match result {
            Ok(()) => tracing::info!(flag = %self.path.display(), "Created flag file (on)"),
            Err(e) => tracing::warn!(flag = %self.path.display(), error = %e, "Failed to create flag file"),
        }
    }
}
