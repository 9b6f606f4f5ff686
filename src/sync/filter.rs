//! Path filtering for watch and sync operations.
//!
//! Filters operate on logical paths: forward-slash separated, relative to
//! the vault root. Built-in patterns keep tool state, editor droppings and
//! conflict backups out of the sync set.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Patterns always excluded from watching and syncing.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    // Sync state
    ".vaultsync",
    ".vaultsync/**",
    "*.conflict-*",
    // Version control / vault tooling
    ".git",
    ".git/**",
    ".obsidian",
    ".obsidian/**",
    ".trash",
    ".trash/**",
    // OS-specific
    ".DS_Store",
    "Thumbs.db",
    // Editor temporaries
    "*.tmp",
    "*.swp",
    "*~",
];

/// Decides which documents participate in sync.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    /// Compiled glob set for artifact exclusion.
    glob_set: GlobSet,
    /// Raw pattern strings (for display/serialization).
    patterns: Vec<String>,
    /// Only paths under one of these directories are included. Empty means
    /// the whole vault.
    include_dirs: Vec<String>,
    /// Paths under any of these directories are skipped.
    exclude_dirs: Vec<String>,
    /// Required file extension, compared case-insensitively.
    extension: String,
}

impl Default for WatchFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchFilter {
    /// Create a filter with the built-in excludes and the default `md`
    /// extension.
    pub fn new() -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut patterns = Vec::new();

        for pattern in DEFAULT_EXCLUDES {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
                patterns.push(pattern.to_string());
            }
        }

        Self {
            glob_set: builder.build().unwrap_or_else(|_| GlobSet::empty()),
            patterns,
            include_dirs: Vec::new(),
            exclude_dirs: Vec::new(),
            extension: "md".to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_lowercase();
        self
    }

    pub fn include_dir(mut self, dir: impl Into<String>) -> Self {
        self.include_dirs.push(normalize_dir(dir.into()));
        self
    }

    pub fn exclude_dir(mut self, dir: impl Into<String>) -> Self {
        self.exclude_dirs.push(normalize_dir(dir.into()));
        self
    }

    /// Add an exclusion glob on top of the built-in set.
    pub fn add_pattern(&mut self, pattern: &str) -> Result<()> {
        let mut builder = GlobSetBuilder::new();
        for existing in &self.patterns {
            if let Ok(glob) = Glob::new(existing) {
                builder.add(glob);
            }
        }

        let glob = Glob::new(pattern)?;
        builder.add(glob);
        self.patterns.push(pattern.to_string());

        self.glob_set = builder.build()?;
        Ok(())
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Check whether a logical path participates in sync.
    pub fn matches(&self, path: &str) -> bool {
        if !self.has_extension(path) {
            return false;
        }
        if self.is_excluded(path) {
            return false;
        }
        if self
            .exclude_dirs
            .iter()
            .any(|dir| in_dir(path, dir))
        {
            return false;
        }
        if !self.include_dirs.is_empty()
            && !self.include_dirs.iter().any(|dir| in_dir(path, dir))
        {
            return false;
        }
        true
    }

    fn has_extension(&self, path: &str) -> bool {
        match path.rsplit_once('.') {
            Some((stem, ext)) => !stem.is_empty() && ext.eq_ignore_ascii_case(&self.extension),
            None => false,
        }
    }

    fn is_excluded(&self, path: &str) -> bool {
        if self.glob_set.is_match(path) {
            return true;
        }

        // Also match each path component, for bare directory patterns and
        // filename patterns like ".DS_Store".
        for component in path.split('/') {
            if self.glob_set.is_match(component) {
                return true;
            }
        }

        false
    }
}

fn normalize_dir(dir: String) -> String {
    dir.trim_matches('/').to_string()
}

fn in_dir(path: &str, dir: &str) -> bool {
    if dir.is_empty() {
        return true;
    }
    path == dir || path.starts_with(&format!("{}/", dir))
}
