//! Single-run marker file
//!
//! A run holds `.dropload.lock` (containing its PID) in the working directory
//! for its whole duration. The file is created exclusively, so a second run
//! sees it and stops. It is removed when the [`RunLock`] drops, on success and
//! on error alike.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LOCK_FILE_NAME: &str = ".dropload.lock";

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Another run holds {path} (pid {holder})")]
    Held { path: String, holder: String },

    #[error("Failed to create lock file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(dir: &Path) -> Result<Self, LockError> {
        let path = dir.join(LOCK_FILE_NAME);
        let io_error = |source: std::io::Error| LockError::Io {
            path: path.display().to_string(),
            source,
        };

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                let holder = std::fs::read_to_string(&path)
                    .map(|pid| pid.trim().to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(LockError::Held {
                    path: path.display().to_string(),
                    holder,
                });
            },
            Err(err) => return Err(io_error(err)),
        };

        // Construct before writing so a failed write still removes the file
        let lock = Self { path: path.clone() };
        writeln!(file, "{}", std::process::id()).map_err(io_error)?;

        tracing::debug!(path = %lock.path.display(), "Run lock acquired");
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Run lock released"),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "Failed to remove run lock")
            },
        }
    }
}
