//! Remote store backed by a plain directory.
//!
//! Useful on its own (sync into a mounted network share or a second disk)
//! and as the reference implementation of the [`RemoteStore`] contract.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::trace;

use crate::error::{Result, SyncError};
use crate::store::remote::{RemoteDocument, RemoteStore};
use crate::store::{resolve, system_time_to_utc};

pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Open a directory store, creating the root if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| SyncError::from_io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        resolve(&self.root, path)
    }
}

#[async_trait]
impl RemoteStore for DirStore {
    fn name(&self) -> &'static str {
        "dir"
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full = self.full_path(path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SyncError::from_io(&full, e)),
        }
    }

    async fn read(&self, path: &str) -> Result<RemoteDocument> {
        let full = self.full_path(path)?;
        let content = tokio::fs::read_to_string(&full).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                SyncError::NotFound(path.to_string())
            } else {
                SyncError::from_io(&full, e)
            }
        })?;

        let modified = tokio::fs::metadata(&full)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(system_time_to_utc);

        Ok(RemoteDocument::new(content, modified))
    }

    // the filesystem records its own modification time
    async fn write(
        &self,
        path: &str,
        content: &str,
        _modified: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let full = self.full_path(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::from_io(parent, e))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| SyncError::from_io(&full, e))?;
        trace!(path, bytes = content.len(), "wrote remote document");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.full_path(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::from_io(&full, e)),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from_path = self.full_path(from)?;
        let to_path = self.full_path(to)?;
        if let Some(parent) = to_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::from_io(parent, e))?;
        }
        tokio::fs::rename(&from_path, &to_path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                SyncError::NotFound(from.to_string())
            } else {
                SyncError::from_io(&from_path, e)
            }
        })
    }
}
