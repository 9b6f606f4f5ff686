//! Header block codec for synchronized documents.
//!
//! A document may begin with a delimited header carrying sync state:
//!
//! ```text
//! ---
//! schema: 1
//! author: someone
//! tags:
//!   - alpha
//! links:
//!   - other-note
//! last_synced: 2026-08-25T10:30:00Z
//! sync_source: vault
//! sync_checksum: <hex>
//! ---
//! body…
//! ```
//!
//! Grammar: the opening line is exactly `---`; entries are `key: value`
//! (scalar) or `key:` followed by `  - item` lines (list); keys match
//! `[A-Za-z0-9_-]+`; the closing line is exactly `---`. The parser is
//! line-oriented and returns typed errors; callers that only care whether a
//! usable header exists go through [`extract`], which degrades malformed
//! headers to "absent". Unknown keys round-trip verbatim so newer writers
//! can add fields without older readers dropping them.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;
use tracing::debug;

/// Opening and closing line of the header block.
pub const BLOCK_DELIMITER: &str = "---";

/// Header keys that make up the sync stamp, excluded from content digests.
pub const STAMP_KEYS: [&str; 3] = ["last_synced", "sync_source", "sync_checksum"];

/// Header schema version written by this crate.
pub const CURRENT_SCHEMA: u32 = 1;

const RESERVED_KEYS: [&str; 6] = [
    "schema",
    "tags",
    "links",
    "last_synced",
    "sync_source",
    "sync_checksum",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("header block is not terminated")]
    Unterminated,

    #[error("invalid header entry at line {line}: {text:?}")]
    InvalidEntry { line: usize, text: String },

    #[error("duplicate header key: {0}")]
    DuplicateKey(String),

    #[error("invalid schema version: {0:?}")]
    InvalidSchema(String),

    #[error("invalid sync stamp field {field}: {value:?}")]
    InvalidStamp { field: &'static str, value: String },

    #[error("sync stamp is missing fields")]
    IncompleteStamp,
}

/// Value of a domain or unknown header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

/// Which store performed the last synchronized write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSource {
    Vault,
    Remote,
}

impl SyncSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vault => "vault",
            Self::Remote => "remote",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "vault" => Some(Self::Vault),
            "remote" => Some(Self::Remote),
            _ => None,
        }
    }
}

/// Record of the last successful synchronization of a document.
///
/// `checksum` is the canonical digest of the document at that moment (the
/// digest itself excludes the stamp lines, so rewriting the stamp cannot
/// invalidate it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStamp {
    pub last_synced: DateTime<Utc>,
    pub source: SyncSource,
    pub checksum: String,
}

/// Parsed header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataBlock {
    pub schema: u32,
    /// Domain and unknown fields, opaque to sync. Reserved keys are never
    /// stored here and are skipped by [`serialize`] if present.
    pub fields: BTreeMap<String, FieldValue>,
    pub tags: Vec<String>,
    pub links: Vec<String>,
    pub stamp: Option<SyncStamp>,
}

impl Default for MetadataBlock {
    fn default() -> Self {
        Self {
            schema: CURRENT_SCHEMA,
            fields: BTreeMap::new(),
            tags: Vec::new(),
            links: Vec::new(),
            stamp: None,
        }
    }
}

impl MetadataBlock {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Parse the header block, if any.
///
/// Returns the block and the byte offset where the body starts. `Ok(None)`
/// means the document simply has no header, which is a normal state.
pub fn parse(content: &str) -> Result<Option<(MetadataBlock, usize)>, MetadataError> {
    let (first, mut rest) = split_line(content);
    if first != BLOCK_DELIMITER {
        return Ok(None);
    }

    let mut builder = Builder::default();
    let mut open_list: Option<(String, Vec<String>)> = None;
    let mut line_no = 1usize;

    loop {
        if rest.is_empty() {
            return Err(MetadataError::Unterminated);
        }
        let (line, next) = split_line(rest);
        line_no += 1;

        if line == BLOCK_DELIMITER {
            if let Some((key, items)) = open_list.take() {
                builder.assign(&key, FieldValue::List(items))?;
            }
            let block = builder.finish()?;
            let body_start = content.len() - next.len();
            return Ok(Some((block, body_start)));
        }

        if line.trim().is_empty() {
            rest = next;
            continue;
        }

        if let Some(item) = parse_list_item(line) {
            match open_list.as_mut() {
                Some((_, items)) => items.push(item),
                None => {
                    return Err(MetadataError::InvalidEntry {
                        line: line_no,
                        text: line.to_string(),
                    })
                }
            }
            rest = next;
            continue;
        }

        if let Some((key, items)) = open_list.take() {
            builder.assign(&key, FieldValue::List(items))?;
        }

        match parse_entry(line) {
            Some((key, value)) if value.is_empty() => {
                open_list = Some((key.to_string(), Vec::new()));
            }
            Some((key, value)) => {
                builder.assign(key, FieldValue::Scalar(value.to_string()))?;
            }
            None => {
                return Err(MetadataError::InvalidEntry {
                    line: line_no,
                    text: line.to_string(),
                });
            }
        }
        rest = next;
    }
}

/// Parse, degrading any malformed header to "absent".
pub fn extract(content: &str) -> Option<MetadataBlock> {
    match parse(content) {
        Ok(found) => found.map(|(block, _)| block),
        Err(err) => {
            debug!(error = %err, "malformed header treated as absent");
            None
        }
    }
}

/// Serialize a block deterministically: `schema` first, domain fields in
/// sorted order, then `tags`, `links` and the stamp keys. Re-serializing
/// unchanged metadata is byte-identical, which keeps digests stable across
/// no-op rewrites.
pub fn serialize(block: &MetadataBlock) -> String {
    let mut out = String::new();
    out.push_str(BLOCK_DELIMITER);
    out.push('\n');
    out.push_str(&format!("schema: {}\n", block.schema));

    for (key, value) in &block.fields {
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        match value {
            FieldValue::Scalar(v) => out.push_str(&format!("{}: {}\n", key, v)),
            FieldValue::List(items) => {
                out.push_str(&format!("{}:\n", key));
                for item in items {
                    out.push_str(&format!("  - {}\n", item));
                }
            }
        }
    }

    if !block.tags.is_empty() {
        out.push_str("tags:\n");
        for tag in &block.tags {
            out.push_str(&format!("  - {}\n", tag));
        }
    }
    if !block.links.is_empty() {
        out.push_str("links:\n");
        for link in &block.links {
            out.push_str(&format!("  - {}\n", link));
        }
    }

    if let Some(stamp) = &block.stamp {
        out.push_str(&format!(
            "last_synced: {}\n",
            stamp.last_synced.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
        out.push_str(&format!("sync_source: {}\n", stamp.source.as_str()));
        out.push_str(&format!("sync_checksum: {}\n", stamp.checksum));
    }

    out.push_str(BLOCK_DELIMITER);
    out.push('\n');
    out
}

/// Replace or insert the header block, preserving the body byte-exactly.
///
/// A malformed existing header is kept as body text rather than discarded.
pub fn update(content: &str, block: &MetadataBlock) -> String {
    let body = body_of(content);
    let mut out = serialize(block);
    out.push_str(body);
    out
}

/// The document body: everything after a well-formed header, or the whole
/// document when no usable header exists.
pub fn body_of(content: &str) -> &str {
    match parse(content) {
        Ok(Some((_, body_start))) => &content[body_start..],
        _ => content,
    }
}

/// Replace or insert the sync stamp without reshaping the rest of the
/// document.
///
/// Unlike [`update`], an existing header keeps its own key order and
/// formatting; only the stamp lines are swapped, so stamping a headered
/// document never moves its canonical digest. A document without a header
/// gains a minimal one, which does move the digest; callers that record
/// digests must compute them on the stamped shape.
pub fn set_stamp(content: &str, stamp: &SyncStamp) -> String {
    let stamp_lines = format!(
        "last_synced: {}\nsync_source: {}\nsync_checksum: {}\n",
        stamp.last_synced.to_rfc3339_opts(SecondsFormat::Secs, true),
        stamp.source.as_str(),
        stamp.checksum,
    );

    match parse(content) {
        Ok(Some((_, body_start))) => {
            let header = &content[..body_start];
            let mut out = String::with_capacity(content.len() + stamp_lines.len());
            let mut lines = header.lines();
            if lines.next().is_some() {
                out.push_str(BLOCK_DELIMITER);
                out.push('\n');
            }
            for line in lines {
                if line == BLOCK_DELIMITER {
                    out.push_str(&stamp_lines);
                    out.push_str(BLOCK_DELIMITER);
                    out.push('\n');
                    break;
                }
                if is_stamp_line(line) {
                    continue;
                }
                out.push_str(line);
                out.push('\n');
            }
            out.push_str(&content[body_start..]);
            out
        }
        _ => {
            // no usable header; a malformed one stays in the body untouched
            let mut out = String::new();
            out.push_str(BLOCK_DELIMITER);
            out.push('\n');
            out.push_str(&format!("schema: {}\n", CURRENT_SCHEMA));
            out.push_str(&stamp_lines);
            out.push_str(BLOCK_DELIMITER);
            out.push('\n');
            out.push_str(content);
            out
        }
    }
}

pub(crate) fn is_stamp_line(line: &str) -> bool {
    STAMP_KEYS
        .iter()
        .any(|key| line.strip_prefix(key).is_some_and(|rest| rest.starts_with(':')))
}

fn split_line(s: &str) -> (&str, &str) {
    let (line, rest) = match s.find('\n') {
        Some(i) => (&s[..i], &s[i + 1..]),
        None => (s, ""),
    };
    (line.strip_suffix('\r').unwrap_or(line), rest)
}

fn parse_list_item(line: &str) -> Option<String> {
    line.strip_prefix("  - ").map(|item| item.trim().to_string())
}

fn parse_entry(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim_end();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return None;
    }
    Some((key, value.trim()))
}

#[derive(Default)]
struct Builder {
    schema: Option<u32>,
    fields: BTreeMap<String, FieldValue>,
    tags: Option<Vec<String>>,
    links: Option<Vec<String>>,
    last_synced: Option<DateTime<Utc>>,
    source: Option<SyncSource>,
    checksum: Option<String>,
}

impl Builder {
    fn assign(&mut self, key: &str, value: FieldValue) -> Result<(), MetadataError> {
        match key {
            "schema" => {
                let text = expect_scalar(value, |s| MetadataError::InvalidSchema(s))?;
                let parsed = text
                    .parse::<u32>()
                    .map_err(|_| MetadataError::InvalidSchema(text.clone()))?;
                set_once(&mut self.schema, parsed, key)
            }
            "tags" => {
                let items = expect_list(value, key)?;
                set_once(&mut self.tags, items, key)
            }
            "links" => {
                let items = expect_list(value, key)?;
                set_once(&mut self.links, items, key)
            }
            "last_synced" => {
                let text = expect_scalar(value, |s| MetadataError::InvalidStamp {
                    field: "last_synced",
                    value: s,
                })?;
                let parsed = DateTime::parse_from_rfc3339(&text)
                    .map_err(|_| MetadataError::InvalidStamp {
                        field: "last_synced",
                        value: text.clone(),
                    })?
                    .with_timezone(&Utc);
                set_once(&mut self.last_synced, parsed, key)
            }
            "sync_source" => {
                let text = expect_scalar(value, |s| MetadataError::InvalidStamp {
                    field: "sync_source",
                    value: s,
                })?;
                let parsed =
                    SyncSource::from_str(&text).ok_or(MetadataError::InvalidStamp {
                        field: "sync_source",
                        value: text.clone(),
                    })?;
                set_once(&mut self.source, parsed, key)
            }
            "sync_checksum" => {
                let text = expect_scalar(value, |s| MetadataError::InvalidStamp {
                    field: "sync_checksum",
                    value: s,
                })?;
                if text.is_empty() {
                    return Err(MetadataError::InvalidStamp {
                        field: "sync_checksum",
                        value: text,
                    });
                }
                set_once(&mut self.checksum, text, key)
            }
            _ => {
                if self.fields.contains_key(key) {
                    return Err(MetadataError::DuplicateKey(key.to_string()));
                }
                self.fields.insert(key.to_string(), value);
                Ok(())
            }
        }
    }

    fn finish(self) -> Result<MetadataBlock, MetadataError> {
        let stamp = match (self.last_synced, self.source, self.checksum) {
            (Some(last_synced), Some(source), Some(checksum)) => Some(SyncStamp {
                last_synced,
                source,
                checksum,
            }),
            (None, None, None) => None,
            _ => return Err(MetadataError::IncompleteStamp),
        };

        Ok(MetadataBlock {
            schema: self.schema.unwrap_or(CURRENT_SCHEMA),
            fields: self.fields,
            tags: self.tags.unwrap_or_default(),
            links: self.links.unwrap_or_default(),
            stamp,
        })
    }
}

fn expect_scalar(
    value: FieldValue,
    err: impl FnOnce(String) -> MetadataError,
) -> Result<String, MetadataError> {
    match value {
        FieldValue::Scalar(s) => Ok(s),
        FieldValue::List(_) => Err(err("expected a scalar, found a list".to_string())),
    }
}

fn expect_list(value: FieldValue, key: &str) -> Result<Vec<String>, MetadataError> {
    match value {
        FieldValue::List(items) => Ok(items),
        FieldValue::Scalar(s) => Err(MetadataError::InvalidEntry {
            line: 0,
            text: format!("{}: {} (expected a list)", key, s),
        }),
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, key: &str) -> Result<(), MetadataError> {
    if slot.is_some() {
        return Err(MetadataError::DuplicateKey(key.to_string()));
    }
    *slot = Some(value);
    Ok(())
}
