//! Remote store contract.
//!
//! The sync engine talks to the remote side only through [`RemoteStore`],
//! so directory-backed stores, in-memory test doubles and future network
//! backends are interchangeable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::sync::checksum;

/// Snapshot of a document as held by a remote store.
#[derive(Debug, Clone)]
pub struct RemoteDocument {
    pub content: String,
    /// Canonical digest of `content`. Stores must compute this with
    /// [`checksum::checksum`] so both sides of a pair agree on equality.
    pub checksum: String,
    /// Last modification time, if the store tracks one.
    pub modified: Option<DateTime<Utc>>,
}

impl RemoteDocument {
    pub fn new(content: impl Into<String>, modified: Option<DateTime<Utc>>) -> Self {
        let content = content.into();
        let checksum = checksum::checksum(&content);
        Self {
            content,
            checksum,
            modified,
        }
    }
}

/// Storage operations the engine needs from the remote side.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// Read a document. A missing document is `SyncError::NotFound`.
    async fn read(&self, path: &str) -> Result<RemoteDocument>;

    /// Write a document, creating it if absent. Stores that track their own
    /// modification times may ignore `modified`.
    async fn write(&self, path: &str, content: &str, modified: Option<DateTime<Utc>>)
        -> Result<()>;

    /// Delete a document. Deleting an absent document succeeds.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Move a document. Default is copy then delete.
    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let doc = self.read(from).await?;
        self.write(to, &doc.content, doc.modified).await?;
        self.delete(from).await
    }
}
