//! File system watcher for vault changes.
//!
//! Raw notify events are normalized (renames become delete + create),
//! filtered, then debounced per path with a restartable timer: another
//! change to the same document restarts its window, so a burst of editor
//! saves produces one event. Deletions skip the window and fire at once.
//! Debounced events land on a bounded channel the engine consumes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::store::to_logical;
use crate::sync::filter::WatchFilter;

/// Kind of change to a vault document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultEventKind {
    Created,
    Modified,
    Deleted,
}

/// A debounced change to one vault document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultEvent {
    /// Logical path, relative to the vault root.
    pub path: String,
    pub kind: VaultEventKind,
}

/// Debounce windows and queue sizing.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Window restarted by each modification.
    pub modify_delay: Duration,
    /// Longer window for new files, which are often followed by a burst of
    /// writes.
    pub create_delay: Duration,
    /// Capacity of the debounced event channel.
    pub queue_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            modify_delay: Duration::from_millis(750),
            create_delay: Duration::from_secs(2),
            queue_capacity: 256,
        }
    }
}

/// Watches a vault root and emits debounced [`VaultEvent`]s.
///
/// Dropping the watcher stops the underlying notify watcher; the debounce
/// task then flushes pending events and exits.
pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl VaultWatcher {
    /// Start watching. Must be called from within a tokio runtime.
    ///
    /// Fails if the root cannot be resolved or the platform watcher cannot
    /// be registered.
    pub fn spawn(
        root: impl Into<PathBuf>,
        filter: WatchFilter,
        config: WatcherConfig,
    ) -> Result<(Self, mpsc::Receiver<VaultEvent>)> {
        let root = root.into();
        let root = std::fs::canonicalize(&root).map_err(|e| SyncError::from_io(&root, e))?;

        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<Event>();
        let (out_tx, out_rx) = mpsc::channel(config.queue_capacity);

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    let _ = raw_tx.send(event);
                }
                Err(err) => warn!(error = %err, "watch backend error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(1)),
        )?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let task = tokio::spawn(debounce_loop(root, filter, config, raw_rx, out_tx));

        Ok((
            Self {
                _watcher: watcher,
                task,
            },
            out_rx,
        ))
    }

    /// Stop watching and wait for pending events to flush.
    pub async fn close(self) {
        let Self { _watcher, task } = self;
        drop(_watcher);
        let _ = task.await;
    }
}

struct PendingChange {
    kind: VaultEventKind,
    deadline: Instant,
}

async fn debounce_loop(
    root: PathBuf,
    filter: WatchFilter,
    config: WatcherConfig,
    mut raw_rx: mpsc::UnboundedReceiver<Event>,
    out_tx: mpsc::Sender<VaultEvent>,
) {
    let mut pending: HashMap<String, PendingChange> = HashMap::new();

    loop {
        let next_deadline = pending.values().map(|p| p.deadline).min();

        tokio::select! {
            maybe = raw_rx.recv() => {
                let Some(event) = maybe else {
                    // watcher dropped; flush whatever is pending
                    flush_all(&mut pending, &out_tx).await;
                    return;
                };
                for (path, kind) in normalize(event) {
                    let Some(logical) = to_logical(&root, &path) else {
                        continue;
                    };
                    if !filter.matches(&logical) {
                        continue;
                    }
                    if let Some(immediate) =
                        schedule(&mut pending, logical, kind, Instant::now(), &config)
                    {
                        debug!(path = %immediate.path, "document deleted");
                        if out_tx.send(immediate).await.is_err() {
                            return;
                        }
                    }
                }
            }
            _ = async { tokio::time::sleep_until(next_deadline.unwrap()).await },
                if next_deadline.is_some() =>
            {
                if !flush_due(&mut pending, &out_tx, Instant::now()).await {
                    return;
                }
            }
        }
    }
}

/// Record a change in the pending map. Deletions cancel any pending timer
/// and are returned for immediate emission.
fn schedule(
    pending: &mut HashMap<String, PendingChange>,
    path: String,
    kind: VaultEventKind,
    now: Instant,
    config: &WatcherConfig,
) -> Option<VaultEvent> {
    if kind == VaultEventKind::Deleted {
        pending.remove(&path);
        return Some(VaultEvent {
            path,
            kind: VaultEventKind::Deleted,
        });
    }

    // once a path is pending as Created it stays Created; the engine must
    // still see the document as new
    let kind = match pending.get(&path) {
        Some(p) if p.kind == VaultEventKind::Created => VaultEventKind::Created,
        _ => kind,
    };
    let delay = match kind {
        VaultEventKind::Created => config.create_delay,
        _ => config.modify_delay,
    };
    pending.insert(
        path,
        PendingChange {
            kind,
            deadline: now + delay,
        },
    );
    None
}

async fn flush_due(
    pending: &mut HashMap<String, PendingChange>,
    out_tx: &mpsc::Sender<VaultEvent>,
    now: Instant,
) -> bool {
    let mut due: Vec<String> = pending
        .iter()
        .filter(|(_, p)| p.deadline <= now)
        .map(|(path, _)| path.clone())
        .collect();
    due.sort();

    for path in due {
        let change = pending.remove(&path).unwrap();
        debug!(path = %path, kind = ?change.kind, "debounce window elapsed");
        let event = VaultEvent {
            path,
            kind: change.kind,
        };
        if out_tx.send(event).await.is_err() {
            return false;
        }
    }
    true
}

async fn flush_all(pending: &mut HashMap<String, PendingChange>, out_tx: &mpsc::Sender<VaultEvent>) {
    let mut paths: Vec<String> = pending.keys().cloned().collect();
    paths.sort();
    for path in paths {
        let change = pending.remove(&path).unwrap();
        let event = VaultEvent {
            path,
            kind: change.kind,
        };
        if out_tx.send(event).await.is_err() {
            return;
        }
    }
}

/// Map a raw notify event to per-path changes. Renames are normalized to a
/// deletion of the old path and a creation of the new one.
fn normalize(event: Event) -> Vec<(PathBuf, VaultEventKind)> {
    match event.kind {
        EventKind::Create(_) => event
            .paths
            .into_iter()
            .filter(|p| !p.is_dir())
            .map(|p| (p, VaultEventKind::Created))
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .into_iter()
            .map(|p| (p, VaultEventKind::Deleted))
            .collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => event
                .paths
                .into_iter()
                .map(|p| (p, VaultEventKind::Deleted))
                .collect(),
            RenameMode::To => event
                .paths
                .into_iter()
                .filter(|p| !p.is_dir())
                .map(|p| (p, VaultEventKind::Created))
                .collect(),
            RenameMode::Both => {
                let mut changes = Vec::new();
                let mut paths = event.paths.into_iter();
                if let Some(from) = paths.next() {
                    changes.push((from, VaultEventKind::Deleted));
                }
                if let Some(to) = paths.next() {
                    if !to.is_dir() {
                        changes.push((to, VaultEventKind::Created));
                    }
                }
                changes
            }
            // side unknown; decide by whether the path still exists
            _ => event
                .paths
                .into_iter()
                .map(|p| {
                    let kind = if p.exists() {
                        VaultEventKind::Created
                    } else {
                        VaultEventKind::Deleted
                    };
                    (p, kind)
                })
                .filter(|(p, kind)| *kind == VaultEventKind::Deleted || !p.is_dir())
                .collect(),
        },
        EventKind::Modify(_) => event
            .paths
            .into_iter()
            .filter(|p| !p.is_dir())
            .map(|p| (p, VaultEventKind::Modified))
            .collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}
