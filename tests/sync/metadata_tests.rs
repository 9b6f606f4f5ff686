// Tests for the metadata codec
// Whole-document flows: parsing, rewriting and stamping realistic notes

use chrono::{TimeZone, Utc};

use vaultsync::sync::checksum;
use vaultsync::sync::metadata::{self, FieldValue, SyncSource, SyncStamp};

const NOTE: &str = "\
---
schema: 1
author: morgan
status: draft
tags:
  - project
  - weekly
links:
  - 2026-08-18-weekly
last_synced: 2026-08-24T09:00:00Z
sync_source: remote
sync_checksum: f00d
---
# Weekly plan

- [ ] write the report
- [x] file the expenses

See [[2026-08-18-weekly]] for last week.
";

#[test]
fn test_parse_realistic_note() {
    let block = metadata::extract(NOTE).expect("header parses");

    assert_eq!(block.schema, 1);
    assert_eq!(
        block.fields.get("author"),
        Some(&FieldValue::Scalar("morgan".to_string()))
    );
    assert_eq!(
        block.fields.get("status"),
        Some(&FieldValue::Scalar("draft".to_string()))
    );
    assert_eq!(block.tags, vec!["project".to_string(), "weekly".to_string()]);
    assert_eq!(block.links, vec!["2026-08-18-weekly".to_string()]);

    let stamp = block.stamp.expect("stamp present");
    assert_eq!(stamp.source, SyncSource::Remote);
    assert_eq!(stamp.checksum, "f00d");
    assert_eq!(
        stamp.last_synced,
        Utc.with_ymd_and_hms(2026, 8, 24, 9, 0, 0).unwrap()
    );

    assert!(metadata::body_of(NOTE).starts_with("# Weekly plan\n"));
}

#[test]
fn test_update_rewrites_header_without_touching_body() {
    let body = metadata::body_of(NOTE);

    let mut block = metadata::extract(NOTE).unwrap();
    block
        .fields
        .insert("reviewed".to_string(), FieldValue::Scalar("yes".to_string()));
    block.tags.push("archive".to_string());

    let updated = metadata::update(NOTE, &block);
    assert!(updated.ends_with(body));
    assert!(updated.contains("reviewed: yes\n"));
    assert!(updated.contains("  - archive\n"));

    // the rewritten document parses back to the same block
    assert_eq!(metadata::extract(&updated), Some(block));
}

#[test]
fn test_restamping_never_moves_the_digest() {
    let sum = checksum::checksum(NOTE);

    let stamped = metadata::set_stamp(
        NOTE,
        &SyncStamp {
            last_synced: Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap(),
            source: SyncSource::Vault,
            checksum: sum.clone(),
        },
    );
    assert_eq!(checksum::checksum(&stamped), sum);

    let restamped = metadata::set_stamp(
        &stamped,
        &SyncStamp {
            last_synced: Utc.with_ymd_and_hms(2026, 8, 26, 8, 30, 0).unwrap(),
            source: SyncSource::Remote,
            checksum: sum.clone(),
        },
    );
    assert_eq!(checksum::checksum(&restamped), sum);

    // exactly one stamp survives the rewrites
    assert_eq!(restamped.matches("last_synced:").count(), 1);
    assert_eq!(restamped.matches("sync_source:").count(), 1);
    assert_eq!(restamped.matches("sync_checksum:").count(), 1);
    assert!(restamped.contains("sync_source: remote\n"));
}

#[test]
fn test_crlf_note_is_equivalent() {
    let crlf = NOTE.replace('\n', "\r\n");

    assert_eq!(metadata::extract(&crlf), metadata::extract(NOTE));
    assert_eq!(checksum::checksum(&crlf), checksum::checksum(NOTE));
}

#[test]
fn test_unknown_fields_survive_a_rewrite_cycle() {
    let content = "\
---
schema: 1
deadline: 2026-09-01
priorities:
  - ship
  - document
---
body
";
    let block = metadata::extract(content).expect("unknown keys parse");
    let rewritten = metadata::update(content, &block);

    assert!(rewritten.contains("deadline: 2026-09-01\n"));
    assert!(rewritten.contains("priorities:\n  - ship\n  - document\n"));
    assert_eq!(metadata::extract(&rewritten), Some(block));
}
