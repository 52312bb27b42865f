// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use fieldsync_core::SendStatus;
use serde_json::json;
use yare::parameterized;

#[test]
fn add_stores_unsent_document() {
    let db = Database::open_in_memory().unwrap();

    let doc = add(&db, "acc", "order", "o-1", r#"{"total": 12}"#).unwrap();

    assert_eq!(doc.category, DocumentCategory::Order);
    let stored = db
        .get_document("acc", DocumentCategory::Order, "o-1")
        .unwrap();
    assert_eq!(stored.payload, json!({"total": 12}));
    assert_eq!(stored.status, SendStatus::Unsent);
    assert_eq!(db.count_unsent("acc", DocumentCategory::Order).unwrap(), 1);
}

#[test]
fn add_accepts_endpoint_spelling() {
    let db = Database::open_in_memory().unwrap();
    let doc = add(&db, "acc", "cash_receipts", "r-1", "{}").unwrap();
    assert_eq!(doc.category, DocumentCategory::CashReceipt);
}

#[parameterized(
    unknown_category = { "invoice", "o-1", "{}" },
    blank_id = { "order", "  ", "{}" },
    bad_json = { "order", "o-1", "{total" },
)]
fn add_rejects_bad_input(category: &str, id: &str, payload: &str) {
    let db = Database::open_in_memory().unwrap();
    assert!(add(&db, "acc", category, id, payload).is_err());
    assert_eq!(db.count_unsent("acc", DocumentCategory::Order).unwrap(), 0);
}
