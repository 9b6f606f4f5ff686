//! Sync engine for bidirectional document synchronization.
//!
//! The engine decides, per document, which way content flows: push when
//! only the vault changed, pull when only the remote changed, three-way
//! merge when both diverged from the last agreed state. Every successful
//! sync rewrites the document's sync stamp and records a base snapshot for
//! the next merge. Transient failures are retried with linear backoff;
//! conflicts that no policy can settle are written back to the vault with
//! markers and surfaced in the operation record.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::store::{RemoteDocument, RemoteStore, Vault};
use crate::sync::checksum;
use crate::sync::filter::WatchFilter;
use crate::sync::merge::{self, ConflictMarker, MergePolicy, Resolution};
use crate::sync::metadata::{self, SyncSource, SyncStamp};
use crate::sync::watcher::{VaultEvent, VaultEventKind};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Which documents participate in full syncs.
    pub filter: WatchFilter,
    /// How conflicting regions are settled.
    pub merge_policy: MergePolicy,
    /// Documents synced concurrently by `sync_all`.
    pub batch_size: usize,
    /// Retries for transient I/O failures.
    pub max_retries: u32,
    /// Base delay between retries; attempt n waits n times this.
    pub retry_delay: Duration,
    /// Save a pre-merge copy of the vault document next to it when a
    /// conflict needs manual resolution.
    pub conflict_backups: bool,
    /// Propagate vault deletions to the remote store. Off by default;
    /// deleting a document then only detaches it from sync and the remote
    /// copy is kept.
    pub propagate_deletes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            filter: WatchFilter::new(),
            merge_policy: MergePolicy::default(),
            batch_size: 5,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            conflict_backups: true,
            propagate_deletes: false,
        }
    }
}

/// Which way content flowed for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Vault content replaced the remote copy.
    ToRemote,
    /// Remote content replaced the vault copy.
    ToVault,
    /// Both sides changed; contents were merged.
    Bidirectional,
}

/// Lifecycle state of a sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    /// Finished, but conflict markers await manual resolution.
    Conflict,
}

/// Record of one per-document sync.
#[derive(Debug, Clone)]
pub struct SyncOperation {
    pub id: u64,
    pub path: String,
    /// `None` for no-ops.
    pub direction: Option<SyncDirection>,
    pub status: OpStatus,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    /// Conflict regions left in the vault copy, if any.
    pub conflicts: Vec<ConflictMarker>,
    /// Hints for resolving a manual conflict.
    pub suggestions: Vec<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl SyncOperation {
    fn new(id: u64, path: &str) -> Self {
        Self {
            id,
            path: path.to_string(),
            direction: None,
            status: OpStatus::Pending,
            created_at: Utc::now(),
            retry_count: 0,
            conflicts: Vec::new(),
            suggestions: Vec::new(),
            error: None,
            duration_ms: 0,
        }
    }
}

/// Progress events, published when the engine is built with
/// [`SyncEngine::with_events`].
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Started {
        id: u64,
        path: String,
    },
    Retrying {
        id: u64,
        path: String,
        attempt: u32,
        error: String,
    },
    Finished(SyncOperation),
}

/// Counters across the engine's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SyncStatistics {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub conflicts: u64,
    pub last_sync: Option<DateTime<Utc>>,
    pub total_duration_ms: u64,
}

impl SyncStatistics {
    pub fn average_duration_ms(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            self.total_duration_ms / self.total
        }
    }
}

/// Outcome of a full-vault sync.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub operations: Vec<SyncOperation>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub conflicts: usize,
    /// Paths skipped because another sync already had them in flight.
    pub skipped: usize,
    /// True when cancellation stopped the batch early.
    pub cancelled: bool,
}

impl BatchReport {
    fn record(&mut self, op: SyncOperation) {
        self.total += 1;
        match op.status {
            OpStatus::Completed => self.successful += 1,
            OpStatus::Failed => self.failed += 1,
            OpStatus::Conflict => self.conflicts += 1,
            _ => {}
        }
        self.operations.push(op);
    }
}

/// Cooperative cancellation handle shared between a batch and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Orchestrates synchronization between one vault and one remote store.
pub struct SyncEngine {
    vault: Arc<Vault>,
    remote: Arc<dyn RemoteStore>,
    config: EngineConfig,
    /// Paths currently being synced; a second request is rejected.
    in_flight: Mutex<HashSet<String>>,
    /// Checksum of each document at its last failure, so watcher events
    /// don't retry content that already failed.
    failed: Mutex<HashMap<String, String>>,
    stats: Mutex<SyncStatistics>,
    next_id: AtomicU64,
    events_tx: Option<mpsc::Sender<SyncEvent>>,
}

impl SyncEngine {
    pub fn new(vault: Arc<Vault>, remote: Arc<dyn RemoteStore>, config: EngineConfig) -> Self {
        Self {
            vault,
            remote,
            config,
            in_flight: Mutex::new(HashSet::new()),
            failed: Mutex::new(HashMap::new()),
            stats: Mutex::new(SyncStatistics::default()),
            next_id: AtomicU64::new(1),
            events_tx: None,
        }
    }

    /// Create an engine that publishes progress events.
    pub fn with_events(
        vault: Arc<Vault>,
        remote: Arc<dyn RemoteStore>,
        config: EngineConfig,
        events_tx: mpsc::Sender<SyncEvent>,
    ) -> Self {
        let mut engine = Self::new(vault, remote, config);
        engine.events_tx = Some(events_tx);
        engine
    }

    async fn send_event(&self, event: SyncEvent) {
        if let Some(ref tx) = self.events_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Synchronize one document.
    ///
    /// `Bidirectional` runs the direction decision; `ToRemote` and `ToVault`
    /// force a push or pull regardless of which side is newer. Returns
    /// `SyncError::AlreadySyncing` if the path is in flight. Failures of the
    /// sync itself are reported in the returned operation, not as an error.
    pub async fn sync_one(&self, path: &str, direction: SyncDirection) -> Result<SyncOperation> {
        let _guard = self.begin(path)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        self.send_event(SyncEvent::Started {
            id,
            path: path.to_string(),
        })
        .await;

        let op = self.run_with_retry(id, path, direction).await;
        self.record(&op).await;
        self.send_event(SyncEvent::Finished(op.clone())).await;
        Ok(op)
    }

    /// React to a debounced watcher event.
    ///
    /// Returns `Ok(None)` when nothing needed doing: the path is already in
    /// flight, the content already failed and has not changed since, or the
    /// event was a deletion that is not propagated.
    pub async fn handle_event(&self, event: &VaultEvent) -> Result<Option<SyncOperation>> {
        let path = event.path.as_str();

        if event.kind == VaultEventKind::Deleted {
            return self.handle_delete(path).await;
        }

        // failure memo: skip content that already failed unchanged
        if let Some(current) = self.vault.read(path).await? {
            let failed_sum = self.failed.lock().unwrap().get(path).cloned();
            if failed_sum.as_deref() == Some(checksum::checksum(&current).as_str()) {
                debug!(path, "unchanged since last failure; not retrying");
                return Ok(None);
            }
        }

        match self.sync_one(path, SyncDirection::Bidirectional).await {
            Ok(op) => Ok(Some(op)),
            Err(SyncError::AlreadySyncing(_)) => {
                debug!(path, "sync already in flight; event dropped");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn handle_delete(&self, path: &str) -> Result<Option<SyncOperation>> {
        self.failed.lock().unwrap().remove(path);

        if !self.config.propagate_deletes {
            let _guard = match self.begin(path) {
                Ok(guard) => guard,
                Err(SyncError::AlreadySyncing(_)) => {
                    debug!(path, "sync already in flight; deletion event dropped");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };
            // dropping the snapshot detaches the path from sync entirely;
            // the remote copy stays put and is not pulled back
            self.vault.remove_base(path).await?;
            info!(path, "vault deletion not propagated; remote copy kept");
            return Ok(None);
        }

        // a regular sync already knows what a missing local document means:
        // delete the remote copy when it still matches the last agreed
        // state, restore it otherwise
        info!(path, "vault deletion observed; reconciling");
        match self.sync_one(path, SyncDirection::Bidirectional).await {
            Ok(op) => Ok(Some(op)),
            Err(SyncError::AlreadySyncing(_)) => {
                debug!(path, "sync already in flight; deletion event dropped");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Synchronize every document visible to the configured filter, in
    /// fixed-size concurrent batches. Documents that exist only as base
    /// snapshots (deleted locally) are included.
    pub async fn sync_all(&self, cancel: &CancelFlag) -> Result<BatchReport> {
        let mut paths = self.vault.list_documents(&self.config.filter)?;
        for base in self.vault.list_bases(&self.config.filter)? {
            if !paths.contains(&base) {
                paths.push(base);
            }
        }
        paths.sort();

        info!(documents = paths.len(), "full sync started");
        let mut report = BatchReport::default();

        for chunk in paths.chunks(self.config.batch_size.max(1)) {
            if cancel.is_cancelled() {
                info!("full sync cancelled");
                report.cancelled = true;
                break;
            }

            let results = join_all(
                chunk
                    .iter()
                    .map(|path| self.sync_one(path, SyncDirection::Bidirectional)),
            )
            .await;
            for (path, result) in chunk.iter().zip(results) {
                match result {
                    Ok(op) => report.record(op),
                    Err(SyncError::AlreadySyncing(_)) => {
                        debug!(path, "in flight elsewhere; skipped");
                        report.skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        info!(
            total = report.total,
            successful = report.successful,
            failed = report.failed,
            conflicts = report.conflicts,
            "full sync finished"
        );
        Ok(report)
    }

    pub fn stats(&self) -> SyncStatistics {
        self.stats.lock().unwrap().clone()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock().unwrap() = SyncStatistics::default();
    }

    fn begin(&self, path: &str) -> Result<FlightGuard<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap();
        if !in_flight.insert(path.to_string()) {
            return Err(SyncError::AlreadySyncing(path.to_string()));
        }
        Ok(FlightGuard { engine: self, path: path.to_string() })
    }

    async fn record(&self, op: &SyncOperation) {
        {
            let mut stats = self.stats.lock().unwrap();
            stats.total += 1;
            match op.status {
                OpStatus::Completed => stats.successful += 1,
                OpStatus::Failed => stats.failed += 1,
                OpStatus::Conflict => stats.conflicts += 1,
                _ => {}
            }
            stats.last_sync = Some(Utc::now());
            stats.total_duration_ms += op.duration_ms;
        }

        match op.status {
            OpStatus::Failed => {
                // remember what the document looked like when it failed
                if let Ok(Some(content)) = self.vault.read(&op.path).await {
                    self.failed
                        .lock()
                        .unwrap()
                        .insert(op.path.clone(), checksum::checksum(&content));
                }
            }
            _ => {
                self.failed.lock().unwrap().remove(&op.path);
            }
        }
    }

    async fn run_with_retry(&self, id: u64, path: &str, direction: SyncDirection) -> SyncOperation {
        let started = Instant::now();
        let mut op = SyncOperation::new(id, path);
        op.status = OpStatus::InProgress;

        let mut attempt = 0u32;
        loop {
            match self.sync_path(path, direction).await {
                Ok(outcome) => {
                    op.direction = outcome.direction;
                    op.status = outcome.status;
                    op.conflicts = outcome.conflicts;
                    op.suggestions = outcome.suggestions;
                    break;
                }
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    op.retry_count = attempt;
                    warn!(path, attempt, error = %e, "transient failure; retrying");
                    self.send_event(SyncEvent::Retrying {
                        id,
                        path: path.to_string(),
                        attempt,
                        error: e.to_string(),
                    })
                    .await;
                    tokio::time::sleep(self.config.retry_delay * attempt).await;
                }
                Err(e) => {
                    warn!(path, error = %e, "sync failed");
                    op.status = OpStatus::Failed;
                    op.error = Some(e.to_string());
                    break;
                }
            }
        }

        op.duration_ms = started.elapsed().as_millis() as u64;
        op
    }

    /// Apply the requested direction for one document, deciding it first
    /// when the request is bidirectional.
    async fn sync_path(&self, path: &str, direction: SyncDirection) -> Result<Outcome> {
        let local = self.vault.read(path).await?;
        let remote = match self.remote.read(path).await {
            Ok(doc) => Some(doc),
            Err(SyncError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        match direction {
            SyncDirection::ToRemote => return self.sync_to_remote(path, local, remote).await,
            SyncDirection::ToVault => return self.sync_to_vault(path, local, remote).await,
            SyncDirection::Bidirectional => {}
        }

        match (local, remote) {
            (None, None) => {
                self.vault.remove_base(path).await?;
                debug!(path, "absent on both sides");
                Ok(Outcome::noop())
            }
            (Some(local), None) => {
                if !merge::is_resolved(&local) {
                    return Ok(Outcome::unresolved(path));
                }
                info!(path, store = self.remote.name(), "pushing new document");
                self.replicate(path, &local, SyncSource::Vault, None).await?;
                Ok(Outcome::completed(SyncDirection::ToRemote))
            }
            (None, Some(remote_doc)) => self.sync_local_missing(path, remote_doc).await,
            (Some(local), Some(remote_doc)) => self.sync_both(path, local, remote_doc).await,
        }
    }

    /// Requested push: the vault copy replaces the remote copy regardless
    /// of which side is newer. Fails when the document is missing locally;
    /// forcing a push is never a way to delete the remote copy.
    async fn sync_to_remote(
        &self,
        path: &str,
        local: Option<String>,
        remote: Option<RemoteDocument>,
    ) -> Result<Outcome> {
        let Some(local) = local else {
            return Err(SyncError::NotFound(path.to_string()));
        };
        if !merge::is_resolved(&local) {
            return Ok(Outcome::unresolved(path));
        }
        if let Some(remote_doc) = &remote {
            if checksum::checksum(&local) == remote_doc.checksum {
                self.ensure_base(path, &local).await?;
                debug!(path, "checksums equal; nothing to push");
                return Ok(Outcome::noop());
            }
        }

        info!(path, store = self.remote.name(), "pushing vault copy");
        self.replicate(path, &local, SyncSource::Vault, remote.as_ref())
            .await?;
        Ok(Outcome::completed(SyncDirection::ToRemote))
    }

    /// Requested pull: the remote copy replaces the vault copy. Pulling
    /// over an unresolved document is the supported way to settle a
    /// conflict in the remote's favor; edits that only exist in the vault
    /// are saved to a conflict backup before they are overwritten.
    async fn sync_to_vault(
        &self,
        path: &str,
        local: Option<String>,
        remote: Option<RemoteDocument>,
    ) -> Result<Outcome> {
        let Some(remote_doc) = remote else {
            return Err(SyncError::NotFound(path.to_string()));
        };
        if let Some(local) = &local {
            if checksum::checksum(local) == remote_doc.checksum {
                self.ensure_base(path, local).await?;
                debug!(path, "checksums equal; nothing to pull");
                return Ok(Outcome::noop());
            }
            if self.config.conflict_backups {
                let backup = self.vault.write_conflict_backup(path, local).await?;
                debug!(path, backup = %backup, "saved vault copy before pull");
            }
        }

        info!(path, store = self.remote.name(), "pulling remote copy");
        self.pull(path, &remote_doc).await?;
        Ok(Outcome::completed(SyncDirection::ToVault))
    }

    /// Make sure the base snapshot records `content` as the agreed state.
    async fn ensure_base(&self, path: &str, content: &str) -> Result<()> {
        let plain = checksum::without_stamp(content);
        if self.vault.read_base(path).await?.as_deref() != Some(plain.as_str()) {
            self.vault.write_base(path, &plain).await?;
        }
        Ok(())
    }

    async fn sync_local_missing(&self, path: &str, remote_doc: RemoteDocument) -> Result<Outcome> {
        if self.config.propagate_deletes {
            if let Some(base) = self.vault.read_base(path).await? {
                // remote unchanged since the last agreed state, so the only
                // change is the local deletion
                if checksum::checksum(&base) == remote_doc.checksum {
                    info!(path, "propagating vault deletion to remote");
                    self.remote.delete(path).await?;
                    self.vault.remove_base(path).await?;
                    return Ok(Outcome::completed(SyncDirection::ToRemote));
                }
            }
        }

        info!(path, store = self.remote.name(), "pulling document");
        self.pull(path, &remote_doc).await?;
        Ok(Outcome::completed(SyncDirection::ToVault))
    }

    async fn sync_both(
        &self,
        path: &str,
        local: String,
        remote_doc: RemoteDocument,
    ) -> Result<Outcome> {
        if !merge::is_resolved(&local) {
            debug!(path, "conflict markers still present; not syncing");
            return Ok(Outcome::unresolved(path));
        }

        let local_sum = checksum::checksum(&local);
        if local_sum == remote_doc.checksum {
            // already in agreement; make sure the snapshot reflects it
            self.ensure_base(path, &local).await?;
            debug!(path, "checksums equal; nothing to do");
            return Ok(Outcome::noop());
        }

        let agreed = metadata::extract(&local)
            .and_then(|block| block.stamp)
            .map(|stamp| stamp.checksum)
            .or_else(|| {
                metadata::extract(&remote_doc.content)
                    .and_then(|block| block.stamp)
                    .map(|stamp| stamp.checksum)
            });

        // without any stamp both sides count as changed
        let (local_changed, remote_changed) = match &agreed {
            Some(sum) => (&local_sum != sum, &remote_doc.checksum != sum),
            None => (true, true),
        };

        match (local_changed, remote_changed) {
            (true, false) => {
                info!(path, "only the vault changed; pushing");
                self.replicate(path, &local, SyncSource::Vault, Some(&remote_doc))
                    .await?;
                Ok(Outcome::completed(SyncDirection::ToRemote))
            }
            (false, true) => {
                info!(path, "only the remote changed; pulling");
                self.pull(path, &remote_doc).await?;
                Ok(Outcome::completed(SyncDirection::ToVault))
            }
            _ => self.merge_divergent(path, &local, &remote_doc).await,
        }
    }

    async fn merge_divergent(
        &self,
        path: &str,
        local: &str,
        remote_doc: &RemoteDocument,
    ) -> Result<Outcome> {
        let base = self.vault.read_base(path).await?.unwrap_or_default();
        if base.is_empty() {
            debug!(path, "no base snapshot; degrading to two-way comparison");
        }
        let local_plain = checksum::without_stamp(local);
        let remote_plain = checksum::without_stamp(&remote_doc.content);

        match merge::resolve(&base, &local_plain, &remote_plain) {
            Resolution::Auto(merged) => {
                info!(path, "both sides changed; merged cleanly");
                self.replicate(path, &merged, SyncSource::Vault, Some(remote_doc))
                    .await?;
                Ok(Outcome::completed(SyncDirection::Bidirectional))
            }
            Resolution::Manual {
                content,
                conflicts,
                suggestions,
            } => {
                let local_modified = self.vault.modified(path).await?;
                if let Some(settled) = merge::apply_policy(
                    &content,
                    self.config.merge_policy,
                    local_modified,
                    remote_doc.modified,
                ) {
                    info!(path, policy = ?self.config.merge_policy, "conflict settled by policy");
                    self.replicate(path, &settled, SyncSource::Vault, Some(remote_doc))
                        .await?;
                    return Ok(Outcome::completed(SyncDirection::Bidirectional));
                }

                warn!(
                    path,
                    regions = conflicts.len(),
                    "conflict needs manual resolution"
                );
                if self.config.conflict_backups {
                    let backup = self.vault.write_conflict_backup(path, local).await?;
                    debug!(path, backup = %backup, "saved pre-merge copy");
                }
                // markers go to the vault only; the remote keeps its version
                // until the user settles the document
                self.vault.write(path, &content).await?;
                // the next merge measures the resolution against the remote
                // state the user saw inside the markers
                self.vault.write_base(path, &remote_plain).await?;
                Ok(Outcome::conflict(conflicts, suggestions))
            }
        }
    }

    /// Write `content` to both stores with a fresh stamp, remote first.
    /// If the vault write fails the remote is restored to its prior state.
    async fn replicate(
        &self,
        path: &str,
        content: &str,
        source: SyncSource,
        prior: Option<&RemoteDocument>,
    ) -> Result<()> {
        let now = Utc::now();
        let (stamped, _sum) = stamp(content, source, now);

        self.remote.write(path, &stamped, Some(now)).await?;
        if let Err(e) = self.vault.write(path, &stamped).await {
            warn!(path, error = %e, "vault write failed; restoring remote");
            let rollback = match prior {
                Some(doc) => self.remote.write(path, &doc.content, doc.modified).await,
                None => self.remote.delete(path).await,
            };
            if let Err(rollback_err) = rollback {
                warn!(path, error = %rollback_err, "remote rollback failed");
            }
            return Err(e);
        }

        self.vault
            .write_base(path, &checksum::without_stamp(&stamped))
            .await
    }

    /// Bring the remote content into the vault with a fresh stamp. A
    /// document that already has a header keeps the same digest once
    /// stamped, so the remote copy stays byte-untouched. A headerless
    /// document gains a minimal header and must be replicated so both
    /// sides keep the same canonical content.
    async fn pull(&self, path: &str, remote_doc: &RemoteDocument) -> Result<()> {
        let (stamped, sum) = stamp(&remote_doc.content, SyncSource::Remote, Utc::now());
        if sum != remote_doc.checksum {
            return self
                .replicate(path, &remote_doc.content, SyncSource::Remote, Some(remote_doc))
                .await;
        }

        self.vault.write(path, &stamped).await?;
        self.vault
            .write_base(path, &checksum::without_stamp(&stamped))
            .await
    }
}

/// Stamp `content` with its canonical digest. The digest is computed on the
/// stamped shape, so the recorded checksum always describes the document it
/// sits in even when stamping introduced a header.
fn stamp(content: &str, source: SyncSource, now: DateTime<Utc>) -> (String, String) {
    let provisional = SyncStamp {
        last_synced: now,
        source,
        checksum: "0".to_string(),
    };
    let shaped = metadata::set_stamp(content, &provisional);
    let sum = checksum::checksum(&shaped);
    let stamped = metadata::set_stamp(
        &shaped,
        &SyncStamp {
            last_synced: now,
            source,
            checksum: sum.clone(),
        },
    );
    debug_assert_eq!(checksum::checksum(&stamped), sum);
    (stamped, sum)
}

struct FlightGuard<'a> {
    engine: &'a SyncEngine,
    path: String,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.engine.in_flight.lock().unwrap().remove(&self.path);
    }
}

#[derive(Debug)]
struct Outcome {
    direction: Option<SyncDirection>,
    status: OpStatus,
    conflicts: Vec<ConflictMarker>,
    suggestions: Vec<String>,
}

impl Outcome {
    fn noop() -> Self {
        Self {
            direction: None,
            status: OpStatus::Completed,
            conflicts: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    fn completed(direction: SyncDirection) -> Self {
        Self {
            direction: Some(direction),
            ..Self::noop()
        }
    }

    fn conflict(conflicts: Vec<ConflictMarker>, suggestions: Vec<String>) -> Self {
        Self {
            direction: Some(SyncDirection::Bidirectional),
            status: OpStatus::Conflict,
            conflicts,
            suggestions,
        }
    }

    fn unresolved(path: &str) -> Self {
        Self {
            direction: None,
            status: OpStatus::Conflict,
            conflicts: Vec::new(),
            suggestions: vec![format!(
                "{} still contains conflict markers; resolve them to resume syncing",
                path
            )],
        }
    }
}
