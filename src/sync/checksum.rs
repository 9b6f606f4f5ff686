//! Canonical content digests for divergence detection.
//!
//! Digests use BLAKE3 over a canonical form of the document so that
//! whitespace-only noise (CRLF line endings, trailing spaces, extra trailing
//! blank lines) never registers as divergence. Collision resistance is not
//! security-critical here; digests are only compared for equality.

use crate::sync::metadata::{is_stamp_line, BLOCK_DELIMITER};

/// Reduce content to its canonical form: LF line endings, per-line trailing
/// whitespace stripped, trailing blank lines collapsed to a single newline.
pub fn canonicalize(content: &str) -> String {
    let mut out = String::with_capacity(content.len() + 1);
    for line in content.lines() {
        out.push_str(line.trim_end());
        out.push('\n');
    }
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

/// Canonical digest of a document.
///
/// Computed over the full canonical document (body, domain fields, tags and
/// links included) with exactly the sync stamp lines
/// (`last_synced`/`sync_source`/`sync_checksum`) excluded. Excluding the
/// stamp breaks the circularity of a digest that would otherwise describe
/// itself: rewriting the stamp never changes the digest the stamp records.
/// Stamp-shaped lines in the body are *not* excluded; only header lines are.
pub fn checksum(content: &str) -> String {
    let canonical = canonicalize(content);
    let stripped = strip_stamp_lines(&canonical);
    digest_bytes(stripped.as_bytes())
}

/// BLAKE3 hex digest of raw bytes.
pub fn digest_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Content with the header's stamp lines removed and line endings
/// normalized to LF. Used for base snapshots and merge inputs so that
/// stamped and unstamped copies of the same document align line for line.
pub fn without_stamp(content: &str) -> String {
    strip_stamp_lines(content)
}

/// Drop stamp entries from the header region, leaving the body untouched.
fn strip_stamp_lines(content: &str) -> String {
    let mut lines = content.lines();
    match lines.next() {
        Some(first) if first == BLOCK_DELIMITER => {}
        Some(first) => {
            let mut out = String::with_capacity(content.len());
            out.push_str(first);
            out.push('\n');
            for line in lines {
                out.push_str(line);
                out.push('\n');
            }
            return out;
        }
        None => return String::new(),
    }

    let mut out = String::with_capacity(content.len());
    out.push_str(BLOCK_DELIMITER);
    out.push('\n');

    let mut in_header = true;
    for line in lines {
        if in_header {
            if line == BLOCK_DELIMITER {
                in_header = false;
            } else if is_stamp_line(line) {
                continue;
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}
