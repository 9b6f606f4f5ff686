// Tests for the vault watcher
// Debounce behavior exercised against a real filesystem; windows are kept
// short and receive timeouts generous to stay stable on slow machines

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use vaultsync::sync::{VaultEvent, VaultEventKind, VaultWatcher, WatchFilter, WatcherConfig};

fn quick_config() -> WatcherConfig {
    WatcherConfig {
        modify_delay: Duration::from_millis(150),
        create_delay: Duration::from_millis(250),
        queue_capacity: 64,
    }
}

async fn recv_within(
    rx: &mut mpsc::Receiver<VaultEvent>,
    dur: Duration,
) -> Option<VaultEvent> {
    timeout(dur, rx.recv()).await.ok().flatten()
}

#[tokio::test]
async fn test_write_burst_coalesces_into_one_event() {
    let dir = tempfile::tempdir().unwrap();
    let (watcher, mut rx) =
        VaultWatcher::spawn(dir.path(), WatchFilter::new(), quick_config()).unwrap();

    for i in 0..10 {
        tokio::fs::write(dir.path().join("note.md"), format!("draft {}\n", i))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let event = recv_within(&mut rx, Duration::from_secs(5))
        .await
        .expect("debounced event");
    assert_eq!(event.path, "note.md");
    assert_eq!(event.kind, VaultEventKind::Created);

    // the burst produced exactly one event
    assert_eq!(recv_within(&mut rx, Duration::from_millis(500)).await, None);
    watcher.close().await;
}

#[tokio::test]
async fn test_delete_fires_immediately_and_cancels_pending() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("note.md");
    std::fs::write(&file, "body\n").unwrap();

    let (watcher, mut rx) =
        VaultWatcher::spawn(dir.path(), WatchFilter::new(), quick_config()).unwrap();

    tokio::fs::write(&file, "edited\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    tokio::fs::remove_file(&file).await.unwrap();

    let event = recv_within(&mut rx, Duration::from_secs(5))
        .await
        .expect("delete event");
    assert_eq!(
        event,
        VaultEvent {
            path: "note.md".to_string(),
            kind: VaultEventKind::Deleted,
        }
    );

    // the pending modification was cancelled, not flushed later
    assert_eq!(recv_within(&mut rx, Duration::from_millis(500)).await, None);
    watcher.close().await;
}

#[tokio::test]
async fn test_excluded_paths_never_surface() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join(".obsidian")).unwrap();

    let (watcher, mut rx) =
        VaultWatcher::spawn(dir.path(), WatchFilter::new(), quick_config()).unwrap();

    tokio::fs::write(dir.path().join(".obsidian/workspace.md"), "ui state\n")
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("draft.tmp"), "scratch\n")
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("kept.md"), "note\n")
        .await
        .unwrap();

    let event = recv_within(&mut rx, Duration::from_secs(5))
        .await
        .expect("event for the included document");
    assert_eq!(event.path, "kept.md");

    assert_eq!(recv_within(&mut rx, Duration::from_millis(500)).await, None);
    watcher.close().await;
}

#[tokio::test]
async fn test_rename_surfaces_as_delete_then_create() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("old.md"), "body\n").unwrap();

    let (watcher, mut rx) =
        VaultWatcher::spawn(dir.path(), WatchFilter::new(), quick_config()).unwrap();

    tokio::fs::rename(dir.path().join("old.md"), dir.path().join("new.md"))
        .await
        .unwrap();

    let mut deleted_old = false;
    let mut created_new = false;
    for _ in 0..4 {
        match recv_within(&mut rx, Duration::from_secs(5)).await {
            Some(VaultEvent {
                path,
                kind: VaultEventKind::Deleted,
            }) if path == "old.md" => deleted_old = true,
            Some(VaultEvent {
                path,
                kind: VaultEventKind::Created,
            }) if path == "new.md" => {
                created_new = true;
                break;
            }
            Some(other) => panic!("unexpected event {:?}", other),
            None => break,
        }
    }
    assert!(deleted_old, "old name should be reported deleted");
    assert!(created_new, "new name should be reported created");
    watcher.close().await;
}

#[tokio::test]
async fn test_close_flushes_pending_events() {
    let dir = tempfile::tempdir().unwrap();
    let (watcher, mut rx) =
        VaultWatcher::spawn(dir.path(), WatchFilter::new(), quick_config()).unwrap();

    tokio::fs::write(dir.path().join("note.md"), "body\n")
        .await
        .unwrap();
    // give the raw event time to reach the debouncer, then close inside
    // the debounce window
    tokio::time::sleep(Duration::from_millis(100)).await;
    watcher.close().await;

    let event = rx.recv().await.expect("pending event flushed on close");
    assert_eq!(event.path, "note.md");
    assert_eq!(rx.recv().await, None);
}
