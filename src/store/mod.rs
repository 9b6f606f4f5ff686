//! Document stores: the local vault and the remote side of a sync pair.

pub mod local_dir;
pub mod memory;
pub mod remote;
pub mod vault;

pub use local_dir::DirStore;
pub use memory::MemoryStore;
pub use remote::{RemoteDocument, RemoteStore};
pub use vault::Vault;

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{Result, SyncError};

/// Resolve a logical path (forward-slash, relative) under a root directory.
///
/// Rejects empty paths, absolute paths and any traversal outside the root.
pub(crate) fn resolve(root: &Path, logical: &str) -> Result<PathBuf> {
    if logical.is_empty() {
        return Err(SyncError::InvalidPath(logical.to_string()));
    }
    let mut full = root.to_path_buf();
    for part in logical.split('/') {
        match part {
            "" | "." | ".." => return Err(SyncError::InvalidPath(logical.to_string())),
            _ => full.push(part),
        }
    }
    Ok(full)
}

/// Convert an absolute path under `root` back to a logical path.
pub(crate) fn to_logical(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

pub(crate) fn system_time_to_utc(t: std::time::SystemTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(
        t.duration_since(std::time::UNIX_EPOCH).ok()?.as_secs() as i64,
        0,
    )
}
