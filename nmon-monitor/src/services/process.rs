//! Bounded external tool execution
//!
//! Every collaborator that shells out (ffmpeg, sox, rclone, the model runner)
//! goes through `run_tool`, which enforces a deadline and kills the child if
//! the deadline passes.

use std::ffi::OsStr;
use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// External tool errors
#[derive(Debug, Error)]
pub enum ToolError {
    /// Binary missing or not executable
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Tool ran and exited non-zero
    #[error("{program} exited with code {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Deadline passed; the child was killed
    #[error("{program} timed out after {elapsed:?}")]
    TimedOut { program: String, elapsed: Duration },

    /// Filesystem step around the tool (temp file rename)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run `program args...` to completion within `deadline`
///
/// Returns the captured output on exit status 0.
pub async fn run_tool<I, S>(program: &str, args: I, deadline: Duration) -> Result<Output, ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(program, ?deadline, "Running external tool");

    let child = command.spawn().map_err(|source| ToolError::Spawn {
        program: program.to_string(),
        source,
    })?;

    // Dropping the wait future on timeout drops the child, which kills it.
    let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?,
        Err(_) => {
            return Err(ToolError::TimedOut {
                program: program.to_string(),
                elapsed: deadline,
            })
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ToolError::Failed {
            program: program.to_string(),
            code: output.status.code(),
            stderr: last_lines(&stderr, 5),
        });
    }

    Ok(output)
}

/// Keep error messages short; ffmpeg banners run for dozens of lines.
fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join(" | ")
}
