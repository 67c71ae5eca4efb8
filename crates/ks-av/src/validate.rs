//! Pre-flight checks on user-supplied paths and time ranges.
//!
//! Facades run these before building an invocation so that bad input is
//! reported as [`Error::InvalidInput`] instead of an ffmpeg failure.

use std::path::Path;
use std::time::Duration;

use ks_core::{Error, Result};

/// Input validation used by the recorder and editor.
pub trait Validator: Send + Sync {
    /// The path must name an existing regular file.
    fn validate_path(&self, path: &Path) -> Result<()>;

    /// `end` must not precede `start`.
    fn validate_time_range(&self, start: Duration, end: Duration) -> Result<()>;

    /// An output path must be non-empty and its parent directory must exist.
    fn validate_output_path(&self, path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_input("output path is empty"));
        }
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
                Err(Error::invalid_input(format!(
                    "output directory does not exist: {}",
                    parent.display()
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Filesystem-backed [`Validator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidator;

impl Validator for DefaultValidator {
    fn validate_path(&self, path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_input("path is empty"));
        }
        let meta = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::invalid_input(format!("file does not exist: {}", path.display()))
            } else {
                Error::invalid_input(format!("cannot access {}: {e}", path.display()))
            }
        })?;
        if !meta.is_file() {
            return Err(Error::invalid_input(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        Ok(())
    }

    fn validate_time_range(&self, start: Duration, end: Duration) -> Result<()> {
        if end < start {
            return Err(Error::invalid_input(format!(
                "end time {:.3}s is before start time {:.3}s",
                end.as_secs_f64(),
                start.as_secs_f64()
            )));
        }
        Ok(())
    }
}
