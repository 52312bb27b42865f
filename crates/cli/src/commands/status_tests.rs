// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;

use super::*;
use crate::sync::Ingestor;
use fieldsync_core::{CheckpointKind, Document, LocalStore};
use serde_json::json;

fn account() -> Account {
    Account::new("acc", "http://server.test")
}

#[test]
fn fresh_store_reports_nothing() {
    let db = Database::open_in_memory().unwrap();

    let report = collect(&db, &account()).unwrap();
    let text = report.to_string();

    assert_eq!(report.total_unsent(), 0);
    assert!(text.contains("Last full sync: never"));
    assert!(text.contains("Last differential sync: never"));
    assert!(text.contains("none (run 'fieldsync full')"));
    assert!(!text.contains("Relay:"));
}

#[test]
fn counts_unsent_documents_per_category() {
    let db = Database::open_in_memory().unwrap();
    for id in ["o-1", "o-2"] {
        db.add_document("acc", &Document::new(DocumentCategory::Order, id, json!({})))
            .unwrap();
    }
    db.add_document(
        "acc",
        &Document::new(DocumentCategory::ClientLocation, "l-1", json!({})),
    )
    .unwrap();
    db.add_document(
        "other",
        &Document::new(DocumentCategory::Order, "o-9", json!({})),
    )
    .unwrap();

    let report = collect(&db, &account()).unwrap();
    let text = report.to_string();

    assert_eq!(report.total_unsent(), 3);
    assert!(text.contains("Unsent documents: 3"));
    assert!(text.contains("  order: 2"));
    assert!(text.contains("  client_location: 1"));
    assert!(!text.contains("cash_receipt"));
}

#[test]
fn shows_checkpoints_and_records() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let ingestor = Ingestor::new(db.clone());
    ingestor.ingest(
        "acc",
        &[
            json!({"type": "client", "guid": "c-1", "name": "Shop"}),
            json!({"type": "client", "guid": "c-2", "name": "Kiosk"}),
        ],
        1_000,
    );
    db.save_checkpoint("acc", CheckpointKind::Full, 0).unwrap();

    let report = collect(&db, &account()).unwrap();
    let text = report.to_string();

    assert!(text.contains("Last full sync: 1970-01-01 00:00:00 UTC"));
    assert!(text.contains("Last differential sync: never"));
    assert!(text.contains("  client: 2"));
}

#[test]
fn relay_accounts_show_endpoint() {
    let db = Database::open_in_memory().unwrap();
    let account = account().with_relay_url("ws://relay.test/ws");

    let text = collect(&db, &account).unwrap().to_string();

    assert!(text.contains("Relay: ws://relay.test/ws"));
}
