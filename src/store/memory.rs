//! In-memory remote store.
//!
//! A test double with injectable latency and faults, used by the engine and
//! merge tests to exercise retry, rollback and concurrency behavior without
//! touching the filesystem.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Result, SyncError};
use crate::store::remote::{RemoteDocument, RemoteStore};

#[derive(Debug, Clone)]
struct StoredDoc {
    content: String,
    modified: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, StoredDoc>>,
    latency: Option<Duration>,
    fail_reads: AtomicUsize,
    fail_writes: AtomicUsize,
    deny_all: AtomicBool,
    writes: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation sleeps this long before running. With a paused tokio
    /// clock this makes interleavings deterministic.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed a document with the current time.
    pub fn insert(&self, path: &str, content: &str) {
        self.insert_at(path, content, Utc::now());
    }

    /// Seed a document with an explicit modification time.
    pub fn insert_at(&self, path: &str, content: &str, modified: DateTime<Utc>) {
        self.docs.lock().unwrap().insert(
            path.to_string(),
            StoredDoc {
                content: content.to_string(),
                modified,
            },
        );
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.docs
            .lock()
            .unwrap()
            .get(path)
            .map(|doc| doc.content.clone())
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.docs.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Number of successful writes since construction.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Fail the next `n` reads with a transient I/O error.
    pub fn fail_next_reads(&self, n: usize) {
        self.fail_reads.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` writes with a transient I/O error.
    pub fn fail_next_writes(&self, n: usize) {
        self.fail_writes.store(n, Ordering::SeqCst);
    }

    /// When set, every operation fails with `PermissionDenied`.
    pub fn set_permission_denied(&self, deny: bool) {
        self.deny_all.store(deny, Ordering::SeqCst);
    }

    async fn simulate(&self, path: &str, counter: &AtomicUsize) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.deny_all.load(Ordering::SeqCst) {
            return Err(SyncError::PermissionDenied(path.to_string()));
        }
        if take_one(counter) {
            return Err(SyncError::Io {
                path: path.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionReset, "injected failure"),
            });
        }
        Ok(())
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.simulate(path, &self.fail_reads).await?;
        Ok(self.docs.lock().unwrap().contains_key(path))
    }

    async fn read(&self, path: &str) -> Result<RemoteDocument> {
        self.simulate(path, &self.fail_reads).await?;
        let docs = self.docs.lock().unwrap();
        let doc = docs
            .get(path)
            .ok_or_else(|| SyncError::NotFound(path.to_string()))?;
        Ok(RemoteDocument::new(doc.content.clone(), Some(doc.modified)))
    }

    async fn write(
        &self,
        path: &str,
        content: &str,
        modified: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.simulate(path, &self.fail_writes).await?;
        self.docs.lock().unwrap().insert(
            path.to_string(),
            StoredDoc {
                content: content.to_string(),
                modified: modified.unwrap_or_else(Utc::now),
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.simulate(path, &self.fail_writes).await?;
        self.docs.lock().unwrap().remove(path);
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
