// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;
use tempfile::TempDir;

fn record(kind: RecordKind, key: &str, payload: Value, synced_at: i64) -> StoredRecord {
    StoredRecord {
        kind,
        key: key.to_string(),
        payload,
        synced_at,
    }
}

#[test]
fn test_open_creates_parent_dirs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/deeper/fieldsync.db");
    let db = Database::open(&path).unwrap();
    assert!(path.exists());
    assert_eq!(db.count_records("acc", RecordKind::Client).unwrap(), 0);
}

#[test]
fn test_migrations_are_idempotent() {
    let conn = Connection::open_in_memory().unwrap();
    run_migrations(&conn).unwrap();
    run_migrations(&conn).unwrap();
}

#[test]
fn test_upsert_inserts_then_updates() {
    let db = Database::open_in_memory().unwrap();
    let first = [
        record(RecordKind::Client, "c-1", json!({"name": "A"}), 100),
        record(RecordKind::Client, "c-2", json!({"name": "B"}), 100),
    ];
    let outcome = db.upsert("acc", &first).unwrap();
    assert_eq!(outcome, UpsertOutcome { inserted: 2, updated: 0 });

    let second = [record(RecordKind::Client, "c-1", json!({"name": "A2"}), 200)];
    let outcome = db.upsert("acc", &second).unwrap();
    assert_eq!(outcome, UpsertOutcome { inserted: 0, updated: 1 });

    assert_eq!(db.count_records("acc", RecordKind::Client).unwrap(), 2);
    let stored = db.get_record("acc", RecordKind::Client, "c-1").unwrap().unwrap();
    assert_eq!(stored.payload, json!({"name": "A2"}));
    assert_eq!(stored.synced_at, 200);
}

#[test]
fn test_upsert_twice_yields_one_row() {
    let db = Database::open_in_memory().unwrap();
    let batch = [record(RecordKind::Good, "g-1", json!({"price": 1}), 5)];
    db.upsert("acc", &batch).unwrap();
    db.upsert("acc", &batch).unwrap();
    assert_eq!(db.count_records("acc", RecordKind::Good).unwrap(), 1);
}

#[test]
fn test_upsert_duplicate_keys_in_one_batch() {
    let db = Database::open_in_memory().unwrap();
    let batch = [
        record(RecordKind::Good, "g-1", json!({"v": 1}), 5),
        record(RecordKind::Good, "g-1", json!({"v": 2}), 5),
    ];
    let outcome = db.upsert("acc", &batch).unwrap();
    assert_eq!(outcome.total(), 2);
    let stored = db.get_record("acc", RecordKind::Good, "g-1").unwrap().unwrap();
    assert_eq!(stored.payload, json!({"v": 2}));
}

#[test]
fn test_records_are_scoped_by_account_and_kind() {
    let db = Database::open_in_memory().unwrap();
    db.upsert("a", &[record(RecordKind::Client, "k", json!({}), 1)])
        .unwrap();
    db.upsert("b", &[record(RecordKind::Client, "k", json!({}), 1)])
        .unwrap();
    db.upsert("a", &[record(RecordKind::Company, "k", json!({}), 1)])
        .unwrap();
    assert_eq!(db.count_records("a", RecordKind::Client).unwrap(), 1);
    assert_eq!(db.count_records("b", RecordKind::Client).unwrap(), 1);
    assert_eq!(db.count_records("a", RecordKind::Company).unwrap(), 1);
}

#[test]
fn test_delete_older_than_keeps_refreshed_rows() {
    let db = Database::open_in_memory().unwrap();
    db.upsert(
        "acc",
        &[
            record(RecordKind::Debt, "old", json!({}), 100),
            record(RecordKind::Debt, "fresh", json!({}), 300),
            record(RecordKind::Client, "other-kind", json!({}), 100),
        ],
    )
    .unwrap();

    let deleted = db.delete_older_than("acc", RecordKind::Debt, 300).unwrap();
    assert_eq!(deleted, 1);
    assert!(db.get_record("acc", RecordKind::Debt, "old").unwrap().is_none());
    assert!(db.get_record("acc", RecordKind::Debt, "fresh").unwrap().is_some());
    assert_eq!(db.count_records("acc", RecordKind::Client).unwrap(), 1);
}

#[test]
fn test_fetch_unsent_and_mark_sent() {
    let db = Database::open_in_memory().unwrap();
    let first = Document::new(DocumentCategory::Order, "o-1", json!({"total": 1}));
    let second = Document::new(DocumentCategory::Order, "o-2", json!({"total": 2}));
    let receipt = Document::new(DocumentCategory::CashReceipt, "r-1", json!({}));
    db.add_document("acc", &first).unwrap();
    db.add_document("acc", &second).unwrap();
    db.add_document("acc", &receipt).unwrap();

    let unsent = db.fetch_unsent("acc", DocumentCategory::Order).unwrap();
    let ids: Vec<_> = unsent.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["o-1", "o-2"]);

    db.mark_sent("acc", DocumentCategory::Order, "o-1", SendStatus::Sent)
        .unwrap();
    let unsent = db.fetch_unsent("acc", DocumentCategory::Order).unwrap();
    assert_eq!(unsent.len(), 1);
    assert_eq!(unsent[0].id, "o-2");
    assert_eq!(
        db.get_document("acc", DocumentCategory::Order, "o-1")
            .unwrap()
            .status,
        SendStatus::Sent
    );
    assert_eq!(db.count_unsent("acc", DocumentCategory::CashReceipt).unwrap(), 1);
}

#[test]
fn test_mark_sent_unknown_document() {
    let db = Database::open_in_memory().unwrap();
    let err = db
        .mark_sent("acc", DocumentCategory::Order, "missing", SendStatus::Sent)
        .unwrap_err();
    assert!(matches!(err, Error::DocumentNotFound { .. }));
}

#[test]
fn test_add_document_again_resets_status() {
    let db = Database::open_in_memory().unwrap();
    let doc = Document::new(DocumentCategory::ClientImage, "img-1", json!({"v": 1}));
    db.add_document("acc", &doc).unwrap();
    db.mark_sent("acc", DocumentCategory::ClientImage, "img-1", SendStatus::Sent)
        .unwrap();

    let edited = Document::new(DocumentCategory::ClientImage, "img-1", json!({"v": 2}));
    db.add_document("acc", &edited).unwrap();
    let stored = db
        .get_document("acc", DocumentCategory::ClientImage, "img-1")
        .unwrap();
    assert_eq!(stored.status, SendStatus::Unsent);
    assert_eq!(stored.payload, json!({"v": 2}));
}

#[test]
fn test_checkpoints_are_independent() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(db.checkpoint("acc").unwrap(), SyncCheckpoint::default());

    db.save_checkpoint("acc", CheckpointKind::Full, 1_000).unwrap();
    db.save_checkpoint("acc", CheckpointKind::Differential, 2_000)
        .unwrap();
    db.save_checkpoint("acc", CheckpointKind::Full, 3_000).unwrap();

    let checkpoint = db.checkpoint("acc").unwrap();
    assert_eq!(checkpoint.full_sync_at, Some(3_000));
    assert_eq!(checkpoint.differential_sync_at, Some(2_000));
}
