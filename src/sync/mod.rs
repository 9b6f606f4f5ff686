//! Synchronization core.
//!
//! This module provides the metadata codec, canonical checksums, the
//! three-way merge, the debounced vault watcher, and the engine that
//! ties them together.

pub mod checksum;
pub mod engine;
pub mod filter;
pub mod merge;
pub mod metadata;
pub mod watcher;

pub use engine::{
    BatchReport, CancelFlag, EngineConfig, OpStatus, SyncDirection, SyncEngine, SyncEvent,
    SyncOperation, SyncStatistics,
};
pub use filter::WatchFilter;
pub use merge::{ConflictMarker, ConflictSide, MergePolicy, Resolution};
pub use metadata::{MetadataBlock, MetadataError, SyncSource, SyncStamp};
pub use watcher::{VaultEvent, VaultEventKind, VaultWatcher, WatcherConfig};
