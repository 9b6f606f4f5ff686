//! Three-way merge and conflict policies.
//!
//! The merge is positional and conservative: lines are compared at the same
//! index across base, local and remote. A side that still matches the base
//! yields to the other side's edit; when both sides changed the same
//! position, the region is bracketed with conflict markers rather than
//! guessed at. Content is never dropped silently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sync::metadata;

/// Opening marker of a conflict region (local side follows).
pub const MARKER_LOCAL: &str = "<<<<<<< vault";
/// Separator between the local and remote sides of a region.
pub const MARKER_SEP: &str = "=======";
/// Closing marker of a conflict region.
pub const MARKER_REMOTE: &str = ">>>>>>> remote";

/// How conflicting regions are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Keep conflict markers in place and surface the document for the
    /// user to settle (default).
    #[default]
    Manual,
    /// Keep the vault side of every conflict region.
    PreferLocal,
    /// Keep the remote side of every conflict region.
    PreferRemote,
    /// Keep the side with the newer modification time; falls back to
    /// manual when either side has no timestamp.
    PreferNewest,
}

impl MergePolicy {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Manual => "Leave conflict markers for manual resolution",
            Self::PreferLocal => "Keep the vault side of conflicts",
            Self::PreferRemote => "Keep the remote side of conflicts",
            Self::PreferNewest => "Keep the more recently modified side",
        }
    }
}

/// Which side contributed lines to a conflict region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSide {
    Local,
    Remote,
    Both,
}

/// Location of one conflict region in merged output.
///
/// `start_line` and `end_line` are 0-based indices of the opening and
/// closing marker lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictMarker {
    pub start_line: usize,
    pub end_line: usize,
    pub side: ConflictSide,
}

/// Outcome of a three-way merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// All regions merged cleanly.
    Auto(String),
    /// At least one region conflicts; `content` carries the markers.
    Manual {
        content: String,
        conflicts: Vec<ConflictMarker>,
        suggestions: Vec<String>,
    },
}

/// Merge `local` and `remote` against their common `base`.
pub fn resolve(base: &str, local: &str, remote: &str) -> Resolution {
    let base_lines: Vec<&str> = base.lines().collect();
    let local_lines: Vec<&str> = local.lines().collect();
    let remote_lines: Vec<&str> = remote.lines().collect();

    let len = base_lines
        .len()
        .max(local_lines.len())
        .max(remote_lines.len());

    let mut merged: Vec<String> = Vec::new();
    let mut conflicts: Vec<ConflictMarker> = Vec::new();
    let mut region: Option<(Vec<String>, Vec<String>)> = None;

    for i in 0..len {
        let b = base_lines.get(i).copied();
        let l = local_lines.get(i).copied();
        let r = remote_lines.get(i).copied();

        let keep = if l == r {
            l
        } else if l == b {
            r
        } else if r == b {
            l
        } else {
            let (local_side, remote_side) = region.get_or_insert_with(Default::default);
            if let Some(line) = l {
                local_side.push(line.to_string());
            }
            if let Some(line) = r {
                remote_side.push(line.to_string());
            }
            continue;
        };

        if let Some((local_side, remote_side)) = region.take() {
            flush_region(&mut merged, &mut conflicts, local_side, remote_side);
        }
        if let Some(line) = keep {
            merged.push(line.to_string());
        }
    }
    if let Some((local_side, remote_side)) = region.take() {
        flush_region(&mut merged, &mut conflicts, local_side, remote_side);
    }

    let trailing = local.ends_with('\n') || remote.ends_with('\n');
    let mut content = merged.join("\n");
    if trailing && !content.is_empty() {
        content.push('\n');
    }

    if conflicts.is_empty() {
        Resolution::Auto(content)
    } else {
        let suggestions = suggest(local, remote);
        Resolution::Manual {
            content,
            conflicts,
            suggestions,
        }
    }
}

fn flush_region(
    merged: &mut Vec<String>,
    conflicts: &mut Vec<ConflictMarker>,
    local_side: Vec<String>,
    remote_side: Vec<String>,
) {
    let side = match (local_side.is_empty(), remote_side.is_empty()) {
        (false, true) => ConflictSide::Local,
        (true, false) => ConflictSide::Remote,
        _ => ConflictSide::Both,
    };

    let start_line = merged.len();
    merged.push(MARKER_LOCAL.to_string());
    merged.extend(local_side);
    merged.push(MARKER_SEP.to_string());
    merged.extend(remote_side);
    merged.push(MARKER_REMOTE.to_string());

    conflicts.push(ConflictMarker {
        start_line,
        end_line: merged.len() - 1,
        side,
    });
}

/// Settle every conflict region in `marked` content according to a policy.
///
/// Returns `None` when the policy cannot decide (manual, or newest without
/// timestamps on both sides).
pub fn apply_policy(
    marked: &str,
    policy: MergePolicy,
    local_modified: Option<DateTime<Utc>>,
    remote_modified: Option<DateTime<Utc>>,
) -> Option<String> {
    let keep_local = match policy {
        MergePolicy::Manual => return None,
        MergePolicy::PreferLocal => true,
        MergePolicy::PreferRemote => false,
        MergePolicy::PreferNewest => match (local_modified, remote_modified) {
            (Some(local), Some(remote)) => local >= remote,
            _ => return None,
        },
    };
    Some(take_side(marked, keep_local))
}

fn take_side(marked: &str, keep_local: bool) -> String {
    #[derive(PartialEq)]
    enum State {
        Outside,
        LocalSide,
        RemoteSide,
    }

    let mut state = State::Outside;
    let mut out: Vec<&str> = Vec::new();
    for line in marked.lines() {
        match state {
            State::Outside if line == MARKER_LOCAL => state = State::LocalSide,
            State::LocalSide if line == MARKER_SEP => state = State::RemoteSide,
            State::RemoteSide if line == MARKER_REMOTE => state = State::Outside,
            State::Outside => out.push(line),
            State::LocalSide => {
                if keep_local {
                    out.push(line);
                }
            }
            State::RemoteSide => {
                if !keep_local {
                    out.push(line);
                }
            }
        }
    }

    let mut content = out.join("\n");
    if marked.ends_with('\n') && !content.is_empty() {
        content.push('\n');
    }
    content
}

/// True when no conflict markers remain.
pub fn is_resolved(content: &str) -> bool {
    !content
        .lines()
        .any(|line| line.starts_with("<<<<<<<") || line.starts_with(">>>>>>>"))
}

/// Heuristic hints attached to manual conflicts.
fn suggest(local: &str, remote: &str) -> Vec<String> {
    let mut hints = Vec::new();

    let local_count = local.lines().count();
    let remote_count = remote.lines().count();
    let delta = local_count.abs_diff(remote_count);
    if delta > 10 {
        let larger = if local_count > remote_count {
            "vault"
        } else {
            "remote"
        };
        hints.push(format!(
            "sides differ by {} lines; the {} copy may hold unsynced edits",
            delta, larger
        ));
    }

    let local_meta = metadata::extract(local);
    let remote_meta = metadata::extract(remote);
    if let (Some(local_meta), Some(remote_meta)) = (&local_meta, &remote_meta) {
        for (key, value) in &local_meta.fields {
            match remote_meta.fields.get(key) {
                Some(other) if other != value => {
                    hints.push(format!("metadata field {:?} differs between sides", key));
                }
                None => hints.push(format!("metadata field {:?} only present in vault", key)),
                _ => {}
            }
        }
        for key in remote_meta.fields.keys() {
            if !local_meta.fields.contains_key(key) {
                hints.push(format!("metadata field {:?} only present on remote", key));
            }
        }
        if local_meta.links != remote_meta.links {
            hints.push(format!(
                "links differ: vault has {}, remote has {}",
                local_meta.links.len(),
                remote_meta.links.len()
            ));
        }
        if local_meta.tags != remote_meta.tags {
            hints.push("tags differ between sides".to_string());
        }
    }

    hints
}
