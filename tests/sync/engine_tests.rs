// Tests for the sync engine
// Full push/pull/merge flows against a real vault directory and an
// in-memory remote store

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use vaultsync::error::SyncError;
use vaultsync::store::{MemoryStore, Vault};
use vaultsync::sync::{
    checksum, merge, CancelFlag, EngineConfig, MergePolicy, OpStatus, SyncDirection, SyncEngine,
    SyncEvent, SyncOperation, VaultEvent, VaultEventKind,
};

async fn engine_with(
    store: MemoryStore,
    config: EngineConfig,
) -> (tempfile::TempDir, Arc<Vault>, Arc<MemoryStore>, SyncEngine) {
    let dir = tempfile::tempdir().unwrap();
    let vault = Arc::new(Vault::open(dir.path()).await.unwrap());
    let remote = Arc::new(store);
    let engine = SyncEngine::new(Arc::clone(&vault), remote.clone(), config);
    (dir, vault, remote, engine)
}

async fn setup() -> (tempfile::TempDir, Arc<Vault>, Arc<MemoryStore>, SyncEngine) {
    engine_with(MemoryStore::new(), EngineConfig::default()).await
}

/// Write a document and sync it so both sides agree; returns the stamped
/// content for later edits.
async fn seed_synced(engine: &SyncEngine, vault: &Vault, path: &str, body: &str) -> String {
    vault.write(path, body).await.unwrap();
    let op = engine
        .sync_one(path, SyncDirection::Bidirectional)
        .await
        .unwrap();
    assert_eq!(op.status, OpStatus::Completed);
    vault.read(path).await.unwrap().unwrap()
}

/// Replace one whole line of a document.
fn replace_line(content: &str, from: &str, to: &str) -> String {
    let needle = format!("\n{}\n", from);
    let replacement = format!("\n{}\n", to);
    assert!(content.contains(&needle), "line {:?} not found", from);
    content.replacen(&needle, &replacement, 1)
}

/// Seed a document, then edit the same line differently on both sides and
/// sync, producing a manual conflict.
async fn force_conflict(
    engine: &SyncEngine,
    vault: &Vault,
    remote: &MemoryStore,
    path: &str,
) -> SyncOperation {
    let stamped = seed_synced(engine, vault, path, "intro\nshared line\noutro\n").await;
    vault
        .write(path, &replace_line(&stamped, "shared line", "vault wording"))
        .await
        .unwrap();
    remote.insert(path, &replace_line(&stamped, "shared line", "remote wording"));
    engine
        .sync_one(path, SyncDirection::Bidirectional)
        .await
        .unwrap()
}

fn conflict_backups_in(dir: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains(".conflict-"))
        .collect()
}

#[tokio::test]
async fn test_new_vault_document_is_pushed() {
    let (_dir, vault, remote, engine) = setup().await;
    vault
        .write("notes/first.md", "# First\n\nhello\n")
        .await
        .unwrap();

    let op = engine
        .sync_one("notes/first.md", SyncDirection::Bidirectional)
        .await
        .unwrap();

    assert_eq!(op.status, OpStatus::Completed);
    assert_eq!(op.direction, Some(SyncDirection::ToRemote));

    let pushed = remote.get("notes/first.md").expect("document on remote");
    assert!(pushed.starts_with("---\nschema: 1\n"));
    assert!(pushed.ends_with("# First\n\nhello\n"));

    // vault copy and base snapshot follow the stamped shape
    assert_eq!(
        vault.read("notes/first.md").await.unwrap(),
        Some(pushed.clone())
    );
    assert_eq!(
        vault.read_base("notes/first.md").await.unwrap(),
        Some(checksum::without_stamp(&pushed))
    );
}

#[tokio::test]
async fn test_headerless_remote_document_is_pulled() {
    let (_dir, vault, remote, engine) = setup().await;
    remote.insert("inbox/idea.md", "raw thought\n");

    let op = engine
        .sync_one("inbox/idea.md", SyncDirection::Bidirectional)
        .await
        .unwrap();

    assert_eq!(op.status, OpStatus::Completed);
    assert_eq!(op.direction, Some(SyncDirection::ToVault));

    let local = vault.read("inbox/idea.md").await.unwrap().unwrap();
    assert!(local.starts_with("---\nschema: 1\n"));
    assert!(local.ends_with("raw thought\n"));

    // stamping introduced a header, so the remote copy was rewritten to
    // the same canonical shape and the recorded digest describes both
    assert_eq!(remote.get("inbox/idea.md").unwrap(), local);
    let stamp = vaultsync::sync::metadata::extract(&local)
        .and_then(|block| block.stamp)
        .expect("pulled document carries a stamp");
    assert_eq!(stamp.checksum, checksum::checksum(&local));
}

#[tokio::test]
async fn test_second_sync_is_a_noop() {
    let (_dir, vault, remote, engine) = setup().await;
    let stamped = seed_synced(&engine, &vault, "note.md", "stable\n").await;
    let writes = remote.write_count();

    let op = engine
        .sync_one("note.md", SyncDirection::Bidirectional)
        .await
        .unwrap();

    assert_eq!(op.status, OpStatus::Completed);
    assert_eq!(op.direction, None);
    assert_eq!(remote.write_count(), writes);
    assert_eq!(vault.read("note.md").await.unwrap(), Some(stamped));
}

#[tokio::test]
async fn test_identical_unsynced_copies_agree_without_writes() {
    let (_dir, vault, remote, engine) = setup().await;
    vault.write("same.md", "identical body\n").await.unwrap();
    remote.insert("same.md", "identical body\n");

    let op = engine
        .sync_one("same.md", SyncDirection::Bidirectional)
        .await
        .unwrap();

    assert_eq!(op.status, OpStatus::Completed);
    assert_eq!(op.direction, None);
    assert_eq!(remote.write_count(), 0);

    // agreement is recorded for future three-way merges
    assert_eq!(
        vault.read_base("same.md").await.unwrap().as_deref(),
        Some("identical body\n")
    );
}

#[tokio::test]
async fn test_disjoint_edits_converge() {
    let (_dir, vault, remote, engine) = setup().await;
    let stamped = seed_synced(&engine, &vault, "notes/week.md", "alpha\nbravo\ncharlie\n").await;

    vault
        .write(
            "notes/week.md",
            &replace_line(&stamped, "bravo", "bravo, reworked locally"),
        )
        .await
        .unwrap();
    remote.insert(
        "notes/week.md",
        &replace_line(&stamped, "charlie", "charlie, reworked remotely"),
    );

    let op = engine
        .sync_one("notes/week.md", SyncDirection::Bidirectional)
        .await
        .unwrap();

    assert_eq!(op.status, OpStatus::Completed);
    assert_eq!(op.direction, Some(SyncDirection::Bidirectional));
    assert!(op.conflicts.is_empty());

    let merged = vault.read("notes/week.md").await.unwrap().unwrap();
    assert!(merged.contains("bravo, reworked locally"));
    assert!(merged.contains("charlie, reworked remotely"));
    assert_eq!(remote.get("notes/week.md").unwrap(), merged);
    assert_eq!(
        vault.read_base("notes/week.md").await.unwrap(),
        Some(checksum::without_stamp(&merged))
    );
}

#[tokio::test]
async fn test_same_line_conflict_leaves_markers_in_vault_only() {
    let (dir, vault, remote, engine) = setup().await;
    let op = force_conflict(&engine, &vault, &remote, "notes/meeting.md").await;

    assert_eq!(op.status, OpStatus::Conflict);
    assert_eq!(op.conflicts.len(), 1);

    let marked = vault.read("notes/meeting.md").await.unwrap().unwrap();
    assert!(marked.contains(
        "<<<<<<< vault\nvault wording\n=======\nremote wording\n>>>>>>> remote"
    ));

    // the remote copy is left exactly as the other side wrote it
    let remote_copy = remote.get("notes/meeting.md").unwrap();
    assert!(remote_copy.contains("remote wording"));
    assert!(!remote_copy.contains("<<<<<<<"));

    // the pre-merge vault copy was saved next to the document
    let backups = conflict_backups_in(&dir.path().join("notes"));
    assert_eq!(backups.len(), 1);
    let saved =
        std::fs::read_to_string(dir.path().join("notes").join(&backups[0])).unwrap();
    assert!(saved.contains("vault wording"));
    assert!(!saved.contains("<<<<<<<"));
}

#[tokio::test]
async fn test_conflicted_document_refuses_sync_until_resolved() {
    let (_dir, vault, remote, engine) = setup().await;
    let op = force_conflict(&engine, &vault, &remote, "notes/topic.md").await;
    assert_eq!(op.status, OpStatus::Conflict);

    // while markers remain the document is parked, not retried
    let again = engine
        .sync_one("notes/topic.md", SyncDirection::Bidirectional)
        .await
        .unwrap();
    assert_eq!(again.status, OpStatus::Conflict);
    assert!(again
        .suggestions
        .iter()
        .any(|s| s.contains("conflict markers")));

    // a manual resolution resumes syncing and converges both sides
    let marked = vault.read("notes/topic.md").await.unwrap().unwrap();
    let resolved = marked.replace(
        "<<<<<<< vault\nvault wording\n=======\nremote wording\n>>>>>>> remote",
        "both wordings, reconciled",
    );
    assert!(merge::is_resolved(&resolved));
    vault.write("notes/topic.md", &resolved).await.unwrap();

    let op = engine
        .sync_one("notes/topic.md", SyncDirection::Bidirectional)
        .await
        .unwrap();
    assert_eq!(op.status, OpStatus::Completed);

    let local = vault.read("notes/topic.md").await.unwrap().unwrap();
    assert!(local.contains("both wordings, reconciled"));
    assert_eq!(remote.get("notes/topic.md").unwrap(), local);
}

#[tokio::test]
async fn test_conflict_policy_prefers_remote_side() {
    let config = EngineConfig {
        merge_policy: MergePolicy::PreferRemote,
        ..Default::default()
    };
    let (_dir, vault, remote, engine) = engine_with(MemoryStore::new(), config).await;
    let stamped = seed_synced(&engine, &vault, "note.md", "alpha\nshared\nomega\n").await;

    vault
        .write("note.md", &replace_line(&stamped, "shared", "local take"))
        .await
        .unwrap();
    remote.insert("note.md", &replace_line(&stamped, "shared", "remote take"));

    let op = engine
        .sync_one("note.md", SyncDirection::Bidirectional)
        .await
        .unwrap();

    assert_eq!(op.status, OpStatus::Completed);
    assert_eq!(op.direction, Some(SyncDirection::Bidirectional));

    let merged = vault.read("note.md").await.unwrap().unwrap();
    assert!(merged.contains("alpha\nremote take\nomega\n"));
    assert!(!merged.contains("local take"));
    assert_eq!(remote.get("note.md").unwrap(), merged);
}

#[tokio::test]
async fn test_conflict_policy_prefers_newest_side() {
    let config = EngineConfig {
        merge_policy: MergePolicy::PreferNewest,
        ..Default::default()
    };
    let (_dir, vault, remote, engine) = engine_with(MemoryStore::new(), config).await;
    let stamped = seed_synced(&engine, &vault, "log.md", "entry\ndraft wording\n").await;

    vault
        .write("log.md", &replace_line(&stamped, "draft wording", "vault wording"))
        .await
        .unwrap();
    remote.insert_at(
        "log.md",
        &replace_line(&stamped, "draft wording", "remote wording"),
        Utc::now() + chrono::Duration::hours(1),
    );

    let op = engine
        .sync_one("log.md", SyncDirection::Bidirectional)
        .await
        .unwrap();

    assert_eq!(op.status, OpStatus::Completed);
    let merged = vault.read("log.md").await.unwrap().unwrap();
    assert!(merged.contains("remote wording"));
    assert!(!merged.contains("vault wording"));
}

#[tokio::test]
async fn test_forced_push_overwrites_diverged_remote() {
    let (_dir, vault, remote, engine) = setup().await;
    let stamped = seed_synced(&engine, &vault, "doc.md", "agreed line\n").await;
    remote.insert("doc.md", &replace_line(&stamped, "agreed line", "remote rewrite"));

    // bidirectional would pull here; the forced direction pushes instead
    let op = engine
        .sync_one("doc.md", SyncDirection::ToRemote)
        .await
        .unwrap();
    assert_eq!(op.status, OpStatus::Completed);
    assert_eq!(op.direction, Some(SyncDirection::ToRemote));

    let pushed = remote.get("doc.md").unwrap();
    assert!(pushed.contains("agreed line"));
    assert!(!pushed.contains("remote rewrite"));

    // once both sides agree a forced push becomes a no-op
    let op = engine
        .sync_one("doc.md", SyncDirection::ToRemote)
        .await
        .unwrap();
    assert_eq!(op.direction, None);
}

#[tokio::test]
async fn test_forced_push_requires_local_document() {
    let (_dir, _vault, remote, engine) = setup().await;
    remote.insert("only-remote.md", "content\n");

    let op = engine
        .sync_one("only-remote.md", SyncDirection::ToRemote)
        .await
        .unwrap();

    assert_eq!(op.status, OpStatus::Failed);
    assert!(op.error.unwrap().contains("not found"));
    // pushing is never a way to delete the remote copy
    assert!(remote.get("only-remote.md").is_some());
}

#[tokio::test]
async fn test_forced_push_refuses_unresolved_markers() {
    let (_dir, vault, remote, engine) = setup().await;
    vault
        .write(
            "draft.md",
            "<<<<<<< vault\nmine\n=======\ntheirs\n>>>>>>> remote\n",
        )
        .await
        .unwrap();

    let op = engine
        .sync_one("draft.md", SyncDirection::ToRemote)
        .await
        .unwrap();

    assert_eq!(op.status, OpStatus::Conflict);
    assert!(remote.get("draft.md").is_none());
}

#[tokio::test]
async fn test_forced_pull_overwrites_vault_copy() {
    let (dir, vault, remote, engine) = setup().await;
    let stamped = seed_synced(&engine, &vault, "doc.md", "line one\nline two\n").await;

    vault
        .write("doc.md", &replace_line(&stamped, "line one", "local edit"))
        .await
        .unwrap();
    remote.insert("doc.md", &replace_line(&stamped, "line two", "remote edit"));
    let writes = remote.write_count();

    let op = engine
        .sync_one("doc.md", SyncDirection::ToVault)
        .await
        .unwrap();

    assert_eq!(op.status, OpStatus::Completed);
    assert_eq!(op.direction, Some(SyncDirection::ToVault));

    let local = vault.read("doc.md").await.unwrap().unwrap();
    assert!(local.contains("remote edit"));
    assert!(!local.contains("local edit"));

    // a pull never writes the remote store
    assert_eq!(remote.write_count(), writes);

    // the overwritten vault edits were saved aside first
    let backups = conflict_backups_in(dir.path());
    assert_eq!(backups.len(), 1);
    let saved = std::fs::read_to_string(dir.path().join(&backups[0])).unwrap();
    assert!(saved.contains("local edit"));
}

#[tokio::test]
async fn test_forced_pull_requires_remote_document() {
    let (_dir, vault, _remote, engine) = setup().await;
    vault.write("solo.md", "only in the vault\n").await.unwrap();

    let op = engine
        .sync_one("solo.md", SyncDirection::ToVault)
        .await
        .unwrap();

    assert_eq!(op.status, OpStatus::Failed);
    assert!(op.error.unwrap().contains("not found"));
    assert_eq!(
        vault.read("solo.md").await.unwrap().as_deref(),
        Some("only in the vault\n")
    );
}

#[tokio::test]
async fn test_forced_pull_settles_conflict_markers() {
    let (_dir, vault, remote, engine) = setup().await;
    let op = force_conflict(&engine, &vault, &remote, "notes/fight.md").await;
    assert_eq!(op.status, OpStatus::Conflict);

    // pulling over markers is the supported way to take the remote side
    let op = engine
        .sync_one("notes/fight.md", SyncDirection::ToVault)
        .await
        .unwrap();

    assert_eq!(op.status, OpStatus::Completed);
    assert_eq!(op.direction, Some(SyncDirection::ToVault));

    let local = vault.read("notes/fight.md").await.unwrap().unwrap();
    assert!(merge::is_resolved(&local));
    assert!(local.contains("remote wording"));

    // and the document syncs normally again
    let op = engine
        .sync_one("notes/fight.md", SyncDirection::Bidirectional)
        .await
        .unwrap();
    assert_eq!(op.status, OpStatus::Completed);
}

#[tokio::test]
async fn test_vault_deletion_detaches_without_propagation() {
    let (_dir, vault, remote, engine) = setup().await;
    seed_synced(&engine, &vault, "a.md", "kept remotely\n").await;
    vault.delete("a.md").await.unwrap();

    let event = VaultEvent {
        path: "a.md".to_string(),
        kind: VaultEventKind::Deleted,
    };
    assert!(engine.handle_event(&event).await.unwrap().is_none());

    // the remote copy survives and the path leaves the sync set
    assert!(remote.get("a.md").is_some());
    assert_eq!(remote.delete_count(), 0);
    assert_eq!(vault.read_base("a.md").await.unwrap(), None);

    let report = engine.sync_all(&CancelFlag::new()).await.unwrap();
    assert_eq!(report.total, 0);
    assert_eq!(vault.read("a.md").await.unwrap(), None);
}

#[tokio::test]
async fn test_vault_deletion_propagates_when_remote_unchanged() {
    let config = EngineConfig {
        propagate_deletes: true,
        ..Default::default()
    };
    let (_dir, vault, remote, engine) = engine_with(MemoryStore::new(), config).await;
    seed_synced(&engine, &vault, "a.md", "short lived\n").await;
    vault.delete("a.md").await.unwrap();

    let event = VaultEvent {
        path: "a.md".to_string(),
        kind: VaultEventKind::Deleted,
    };
    let op = engine
        .handle_event(&event)
        .await
        .unwrap()
        .expect("deletion reconciled");

    assert_eq!(op.status, OpStatus::Completed);
    assert_eq!(op.direction, Some(SyncDirection::ToRemote));
    assert_eq!(remote.get("a.md"), None);
    assert_eq!(remote.delete_count(), 1);
    assert_eq!(vault.read_base("a.md").await.unwrap(), None);
}

#[tokio::test]
async fn test_vault_deletion_yields_to_remote_edits() {
    let config = EngineConfig {
        propagate_deletes: true,
        ..Default::default()
    };
    let (_dir, vault, remote, engine) = engine_with(MemoryStore::new(), config).await;
    let stamped = seed_synced(&engine, &vault, "a.md", "original\n").await;

    remote.insert("a.md", &replace_line(&stamped, "original", "edited meanwhile"));
    vault.delete("a.md").await.unwrap();

    let event = VaultEvent {
        path: "a.md".to_string(),
        kind: VaultEventKind::Deleted,
    };
    let op = engine
        .handle_event(&event)
        .await
        .unwrap()
        .expect("deletion reconciled");

    // the remote edit wins over the stale deletion
    assert_eq!(op.direction, Some(SyncDirection::ToVault));
    assert_eq!(remote.delete_count(), 0);
    let restored = vault.read("a.md").await.unwrap().expect("restored");
    assert!(restored.contains("edited meanwhile"));
}

#[tokio::test]
async fn test_offline_deletion_restores_from_base_in_full_sync() {
    let (_dir, vault, remote, engine) = setup().await;
    let stamped = seed_synced(&engine, &vault, "keep.md", "precious\n").await;

    // deleted while no watcher was running; the base snapshot survives
    vault.delete("keep.md").await.unwrap();

    let report = engine.sync_all(&CancelFlag::new()).await.unwrap();
    assert_eq!(report.total, 1);
    assert_eq!(report.successful, 1);
    assert_eq!(report.operations[0].direction, Some(SyncDirection::ToVault));

    let restored = vault.read("keep.md").await.unwrap().expect("restored");
    assert!(restored.ends_with("precious\n"));
    assert_eq!(checksum::checksum(&restored), checksum::checksum(&stamped));
    assert!(remote.get("keep.md").is_some());
}

#[tokio::test]
async fn test_sync_all_covers_filtered_documents_in_batches() {
    let (_dir, vault, remote, engine) = setup().await;

    // more documents than one batch holds
    for name in ["a.md", "b.md", "c.md", "d.md", "e.md", "f.md", "g.md"] {
        vault.write(name, "body\n").await.unwrap();
    }
    // excluded paths stay out of the sync set
    vault
        .write(".obsidian/workspace.md", "ui state\n")
        .await
        .unwrap();
    vault.write("scratch.tmp", "droppings\n").await.unwrap();

    let report = engine.sync_all(&CancelFlag::new()).await.unwrap();

    assert_eq!(report.total, 7);
    assert_eq!(report.successful, 7);
    assert_eq!(report.failed, 0);
    assert_eq!(report.conflicts, 0);
    assert!(!report.cancelled);

    assert_eq!(remote.paths().len(), 7);
    assert!(remote.get(".obsidian/workspace.md").is_none());
    assert_eq!(engine.stats().total, 7);
}

#[tokio::test]
async fn test_sync_all_respects_cancellation() {
    let (_dir, vault, _remote, engine) = setup().await;
    vault.write("a.md", "body\n").await.unwrap();

    let cancel = CancelFlag::new();
    cancel.cancel();

    let report = engine.sync_all(&cancel).await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.total, 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_retry_with_backoff() {
    let (_dir, vault, remote, engine) = setup().await;
    remote.fail_next_writes(2);
    vault.write("a.md", "retry me\n").await.unwrap();

    let op = engine
        .sync_one("a.md", SyncDirection::Bidirectional)
        .await
        .unwrap();

    assert_eq!(op.status, OpStatus::Completed);
    assert_eq!(op.retry_count, 2);
    assert_eq!(remote.write_count(), 1);
    assert!(remote.get("a.md").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_failure_memo_skips_unchanged_content() {
    let (_dir, vault, remote, engine) = setup().await;
    remote.fail_next_writes(10);
    vault.write("a.md", "doomed\n").await.unwrap();

    let op = engine
        .sync_one("a.md", SyncDirection::Bidirectional)
        .await
        .unwrap();
    assert_eq!(op.status, OpStatus::Failed);
    assert_eq!(op.retry_count, 3);
    assert!(op.error.is_some());

    // the watcher path refuses to churn on content that already failed
    let event = VaultEvent {
        path: "a.md".to_string(),
        kind: VaultEventKind::Modified,
    };
    assert!(engine.handle_event(&event).await.unwrap().is_none());

    // an actual edit clears the memo
    vault.write("a.md", "doomed, now edited\n").await.unwrap();
    remote.fail_next_writes(0);
    let op = engine
        .handle_event(&event)
        .await
        .unwrap()
        .expect("edited content syncs");
    assert_eq!(op.status, OpStatus::Completed);

    let stats = engine.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.successful, 1);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn test_permission_denied_fails_without_retry() {
    let (_dir, vault, remote, engine) = setup().await;
    remote.set_permission_denied(true);
    vault.write("a.md", "locked out\n").await.unwrap();

    let op = engine
        .sync_one("a.md", SyncDirection::Bidirectional)
        .await
        .unwrap();

    assert_eq!(op.status, OpStatus::Failed);
    assert_eq!(op.retry_count, 0);
    assert!(op.error.unwrap().contains("permission denied"));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_syncs_of_one_path_are_rejected() {
    let (_dir, vault, _remote, engine) = engine_with(
        MemoryStore::new().with_latency(Duration::from_millis(50)),
        EngineConfig::default(),
    )
    .await;
    vault.write("a.md", "body\n").await.unwrap();

    let (first, second) = tokio::join!(
        engine.sync_one("a.md", SyncDirection::Bidirectional),
        engine.sync_one("a.md", SyncDirection::Bidirectional),
    );

    assert_eq!(first.unwrap().status, OpStatus::Completed);
    assert!(matches!(
        second.unwrap_err(),
        SyncError::AlreadySyncing(_)
    ));

    // the in-flight guard is released once the sync finishes
    let op = engine
        .sync_one("a.md", SyncDirection::Bidirectional)
        .await
        .unwrap();
    assert_eq!(op.status, OpStatus::Completed);
}

#[tokio::test]
async fn test_watcher_events_drive_sync() {
    let (_dir, vault, remote, engine) = setup().await;
    vault.write("inbox/new.md", "fresh\n").await.unwrap();

    let created = VaultEvent {
        path: "inbox/new.md".to_string(),
        kind: VaultEventKind::Created,
    };
    let op = engine
        .handle_event(&created)
        .await
        .unwrap()
        .expect("create event syncs");
    assert_eq!(op.direction, Some(SyncDirection::ToRemote));
    assert!(remote.get("inbox/new.md").is_some());

    // a spurious event for unchanged content is a quiet no-op
    let modified = VaultEvent {
        path: "inbox/new.md".to_string(),
        kind: VaultEventKind::Modified,
    };
    let op = engine
        .handle_event(&modified)
        .await
        .unwrap()
        .expect("event still yields an operation");
    assert_eq!(op.status, OpStatus::Completed);
    assert_eq!(op.direction, None);
}

#[tokio::test(start_paused = true)]
async fn test_progress_events_report_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let vault = Arc::new(Vault::open(dir.path()).await.unwrap());
    let remote = Arc::new(MemoryStore::new());
    let (tx, mut rx) = tokio::sync::mpsc::channel(16);
    let engine = SyncEngine::with_events(
        Arc::clone(&vault),
        remote.clone(),
        EngineConfig::default(),
        tx,
    );

    remote.fail_next_writes(1);
    vault.write("a.md", "hello\n").await.unwrap();
    engine
        .sync_one("a.md", SyncDirection::Bidirectional)
        .await
        .unwrap();

    match rx.recv().await.unwrap() {
        SyncEvent::Started { path, .. } => assert_eq!(path, "a.md"),
        other => panic!("expected Started, got {:?}", other),
    }
    match rx.recv().await.unwrap() {
        SyncEvent::Retrying { attempt, .. } => assert_eq!(attempt, 1),
        other => panic!("expected Retrying, got {:?}", other),
    }
    match rx.recv().await.unwrap() {
        SyncEvent::Finished(op) => {
            assert_eq!(op.status, OpStatus::Completed);
            assert_eq!(op.retry_count, 1);
        }
        other => panic!("expected Finished, got {:?}", other),
    }
}
