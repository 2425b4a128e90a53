//! Cross-process run exclusion through a marker file in the destination.
//!
//! The marker is created with `create_new`, so the existence check and the
//! creation are one atomic filesystem operation: two processes racing for the
//! same destination cannot both succeed.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Holds the lock marker for as long as it lives; dropping it releases the lock.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    /// Creates the marker containing the current pid.
    ///
    /// Fails with [`Error::AlreadyRunning`] when the marker is already present.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::AlreadyRunning {
                    lock_path: path.to_path_buf(),
                    owner_pid: read_owner_pid(path),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let guard = Self {
            path: path.to_path_buf(),
        };
        writeln!(file, "{}", std::process::id())?;
        tracing::debug!("Acquired lock {:?}", guard.path);
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn release(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Released lock {:?}", self.path),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("Lock {:?} was already gone on release", self.path)
            }
            Err(e) => tracing::error!("Failed to remove lock {:?}: {e}", self.path),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release();
    }
}

fn read_owner_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}
