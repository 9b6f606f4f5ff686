//! Local vault access.
//!
//! A vault is a directory of markdown documents owned by the user's editor.
//! Sync state lives under `.vaultsync/` inside the vault: base snapshots
//! (the content both sides agreed on at the last sync) are kept per document
//! so later divergence can be merged three-way instead of two-way.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use jwalk::WalkDir;
use tracing::trace;

use crate::error::{Result, SyncError};
use crate::store::{resolve, system_time_to_utc, to_logical};
use crate::sync::filter::WatchFilter;

/// Directory inside the vault holding sync state.
pub const STATE_DIR: &str = ".vaultsync";

pub struct Vault {
    root: PathBuf,
    base_root: PathBuf,
}

impl Vault {
    /// Open an existing vault directory.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        match tokio::fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(SyncError::InvalidPath(root.display().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SyncError::NotFound(root.display().to_string()));
            }
            Err(e) => return Err(SyncError::from_io(&root, e)),
        }
        let base_root = root.join(STATE_DIR).join("base");
        Ok(Self { root, base_root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert an absolute path inside the vault to a logical path.
    pub fn to_logical(&self, path: &Path) -> Option<String> {
        to_logical(&self.root, path)
    }

    /// Read a document. `None` means it does not exist, a normal state.
    pub async fn read(&self, path: &str) -> Result<Option<String>> {
        read_opt(resolve(&self.root, path)?).await
    }

    /// Write a document, creating parent directories as needed.
    pub async fn write(&self, path: &str, content: &str) -> Result<()> {
        write_creating(resolve(&self.root, path)?, content).await?;
        trace!(path, bytes = content.len(), "wrote vault document");
        Ok(())
    }

    /// Delete a document. Deleting an absent document succeeds.
    pub async fn delete(&self, path: &str) -> Result<()> {
        remove_opt(resolve(&self.root, path)?).await
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        let full = resolve(&self.root, path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SyncError::from_io(&full, e)),
        }
    }

    /// Last modification time, if the document exists.
    pub async fn modified(&self, path: &str) -> Result<Option<DateTime<Utc>>> {
        let full = resolve(&self.root, path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) => Ok(meta.modified().ok().and_then(system_time_to_utc)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::from_io(&full, e)),
        }
    }

    /// Walk the vault and list every document the filter accepts, sorted.
    pub fn list_documents(&self, filter: &WatchFilter) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        // hidden paths go through the filter like everything else
        for entry in WalkDir::new(&self.root)
            .skip_hidden(false)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(logical) = self.to_logical(&path) else {
                continue;
            };
            if filter.matches(&logical) {
                paths.push(logical);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// List every document with a base snapshot, sorted. Documents deleted
    /// from the vault while a snapshot remains still show up here.
    pub fn list_bases(&self, filter: &WatchFilter) -> Result<Vec<String>> {
        if !self.base_root.is_dir() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.base_root)
            .skip_hidden(false)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(logical) = to_logical(&self.base_root, &path) else {
                continue;
            };
            if filter.matches(&logical) {
                paths.push(logical);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Read the base snapshot recorded at the last successful sync.
    pub async fn read_base(&self, path: &str) -> Result<Option<String>> {
        read_opt(resolve(&self.base_root, path)?).await
    }

    /// Record the content both sides agree on after a successful sync.
    pub async fn write_base(&self, path: &str, content: &str) -> Result<()> {
        write_creating(resolve(&self.base_root, path)?, content).await
    }

    pub async fn remove_base(&self, path: &str) -> Result<()> {
        remove_opt(resolve(&self.base_root, path)?).await
    }

    /// Save a pre-merge copy next to the document, named
    /// `<stem>.conflict-<timestamp>.<ext>`. Returns the backup's logical
    /// path.
    pub async fn write_conflict_backup(&self, path: &str, content: &str) -> Result<String> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let mut n = 1;
        let backup = loop {
            let candidate = backup_candidate(path, &stamp, n);
            let full = resolve(&self.root, &candidate)?;
            if !matches!(tokio::fs::try_exists(&full).await, Ok(true)) {
                break candidate;
            }
            n += 1;
        };
        self.write(&backup, content).await?;
        Ok(backup)
    }
}

async fn read_opt(full: PathBuf) -> Result<Option<String>> {
    match tokio::fs::read_to_string(&full).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SyncError::from_io(&full, e)),
    }
}

async fn write_creating(full: PathBuf, content: &str) -> Result<()> {
    if let Some(parent) = full.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::from_io(parent, e))?;
    }
    tokio::fs::write(&full, content)
        .await
        .map_err(|e| SyncError::from_io(&full, e))
}

async fn remove_opt(full: PathBuf) -> Result<()> {
    match tokio::fs::remove_file(&full).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SyncError::from_io(&full, e)),
    }
}

fn backup_candidate(path: &str, stamp: &str, n: u32) -> String {
    let (dir, name) = match path.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, path),
    };
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    let suffix = if n <= 1 {
        String::new()
    } else {
        format!("-{}", n)
    };
    let file = match ext {
        Some(ext) => format!("{}.conflict-{}{}.{}", stem, stamp, suffix, ext),
        None => format!("{}.conflict-{}{}", stem, stamp, suffix),
    };
    match dir {
        Some(dir) => format!("{}/{}", dir, file),
        None => file,
    }
}
