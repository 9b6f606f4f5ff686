//! Configuration file handling.
//!
//! Settings load from an explicit path or from the platform config
//! directory (`~/.config/vaultsync/config.toml` on Linux). A missing file
//! yields defaults; a malformed one is an error.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::sync::{EngineConfig, MergePolicy, WatchFilter, WatcherConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    /// Directory holding the documents to sync.
    pub root: String,
    /// Document extension, without the dot.
    pub extension: String,
    /// Restrict syncing to these directories. Empty means the whole vault.
    pub include: Vec<String>,
    /// Directories to skip.
    pub exclude: Vec<String>,
    /// Extra exclusion globs, on top of the built-in set.
    pub patterns: Vec<String>,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            root: String::new(),
            extension: "md".to_string(),
            include: vec![],
            exclude: vec![],
            patterns: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RemoteSettings {
    /// Directory the documents replicate into.
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub merge_policy: MergePolicy,
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub conflict_backups: bool,
    pub propagate_deletes: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            merge_policy: engine.merge_policy,
            batch_size: engine.batch_size,
            max_retries: engine.max_retries,
            retry_delay_ms: engine.retry_delay.as_millis() as u64,
            conflict_backups: engine.conflict_backups,
            propagate_deletes: engine.propagate_deletes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    pub modify_delay_ms: u64,
    pub create_delay_ms: u64,
    pub queue_capacity: usize,
}

impl Default for WatchSettings {
    fn default() -> Self {
        let watcher = WatcherConfig::default();
        Self {
            modify_delay_ms: watcher.modify_delay.as_millis() as u64,
            create_delay_ms: watcher.create_delay.as_millis() as u64,
            queue_capacity: watcher.queue_capacity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub vault: VaultSettings,
    pub remote: RemoteSettings,
    pub sync: SyncSettings,
    pub watch: WatchSettings,
}

impl Settings {
    /// Platform default location, e.g. `~/.config/vaultsync/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vaultsync").join("config.toml"))
    }

    /// Load from `path` when given, otherwise from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)
            .with_context(|| format!("writing config file {}", path.display()))?;
        Ok(())
    }

    /// Build the document filter from the vault section.
    pub fn filter(&self) -> Result<WatchFilter> {
        let mut filter = WatchFilter::new().with_extension(self.vault.extension.as_str());
        for dir in &self.vault.include {
            filter = filter.include_dir(dir.clone());
        }
        for dir in &self.vault.exclude {
            filter = filter.exclude_dir(dir.clone());
        }
        for pattern in &self.vault.patterns {
            filter
                .add_pattern(pattern)
                .with_context(|| format!("invalid exclude pattern `{pattern}`"))?;
        }
        Ok(filter)
    }

    pub fn engine_config(&self) -> Result<EngineConfig> {
        Ok(EngineConfig {
            filter: self.filter()?,
            merge_policy: self.sync.merge_policy,
            batch_size: self.sync.batch_size,
            max_retries: self.sync.max_retries,
            retry_delay: Duration::from_millis(self.sync.retry_delay_ms),
            conflict_backups: self.sync.conflict_backups,
            propagate_deletes: self.sync.propagate_deletes,
        })
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            modify_delay: Duration::from_millis(self.watch.modify_delay_ms),
            create_delay: Duration::from_millis(self.watch.create_delay_ms),
            queue_capacity: self.watch.queue_capacity,
        }
    }
}
