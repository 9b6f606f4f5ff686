//! Error taxonomy for sync operations.
//!
//! `NotFound` is normal control flow (it decides push vs. pull), `Io` is
//! transient and retried by the engine, `PermissionDenied` fails the
//! operation immediately. A merge conflict is not an error: it is a terminal
//! operation status carrying conflict markers.

use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Document absent on one side. Triggers push/pull rather than failure.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Transient I/O failure; retried with bounded linear backoff.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Fatal for the operation; surfaced immediately, never retried.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A sync for this path is already in flight.
    #[error("sync already in progress for {0}")]
    AlreadySyncing(String),

    /// Logical path escapes the vault root or contains `.`/`..` components.
    #[error("invalid document path: {0}")]
    InvalidPath(String),

    /// Watcher could not be started or lost its backing notifier.
    #[error("watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl SyncError {
    /// Classify an `io::Error` for a path per the retry policy.
    pub fn from_io(path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().display().to_string();
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::Io { path, source },
        }
    }

    /// Whether the engine should retry this failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
