// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use serde_json::json;
use std::time::Duration as StdDuration;

fn ledger() -> PendingLedger {
    PendingLedger::new(StdDuration::from_secs(300), 3)
}

fn track(ledger: &PendingLedger, id: &str) -> SendResults {
    let (tx, rx) = mpsc::unbounded_channel();
    ledger.insert(PendingMessage::new(id, "order", json!({"id": id})), tx);
    SendResults::new(id.to_string(), rx)
}

#[tokio::test]
async fn test_acknowledge_resolves_once() {
    let ledger = ledger();
    let mut results = track(&ledger, "m-1");

    assert!(ledger.acknowledge("m-1"));
    assert!(!ledger.acknowledge("m-1"));
    assert!(!ledger.fail("m-1", "late", false));

    assert_eq!(results.next().await, Some(SendResult::Acknowledged("m-1".into())));
    assert_eq!(results.next().await, None);
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn test_unknown_ack_is_ignored() {
    let ledger = ledger();
    let _results = track(&ledger, "m-1");
    assert!(!ledger.acknowledge("other"));
    assert_eq!(ledger.len(), 1);
}

#[tokio::test]
async fn test_notify_then_ack() {
    let ledger = ledger();
    let results = track(&ledger, "m-1");

    assert!(ledger.notify("m-1", SendResult::Sent("m-1".into())));
    ledger.acknowledge("m-1");
    assert!(!ledger.notify("m-1", SendResult::Pending("m-1".into())));

    assert_eq!(
        results.outcome().await,
        Some(SendResult::Acknowledged("m-1".into()))
    );
}

#[tokio::test]
async fn test_fail_reports_retryability() {
    let ledger = ledger();
    let results = track(&ledger, "m-1");
    ledger.fail("m-1", "rejected by peer", false);

    let outcome = results.outcome().await.unwrap();
    assert!(outcome.is_terminal());
    assert_eq!(
        outcome,
        SendResult::Failed {
            message_id: "m-1".into(),
            error: "rejected by peer".into(),
            can_retry: false,
        }
    );
}

#[test]
fn test_retry_candidates_respect_max_retries() {
    let ledger = ledger();
    let _a = track(&ledger, "a");
    let _b = track(&ledger, "b");

    for _ in 0..3 {
        assert!(ledger.begin_retry("a").is_some());
    }
    assert_eq!(ledger.get("a").unwrap().retry_count, 3);

    let candidates = ledger.retry_candidates(Utc::now());
    assert_eq!(candidates, vec!["b".to_string()]);
}

#[test]
fn test_begin_retry_unknown() {
    let ledger = ledger();
    assert!(ledger.begin_retry("missing").is_none());
}

#[tokio::test]
async fn test_purge_expired() {
    let ledger = ledger();
    let (tx, rx) = mpsc::unbounded_channel();
    let mut old = PendingMessage::new("old", "order", json!({}));
    old.created_at = Utc::now() - Duration::seconds(600);
    ledger.insert(old, tx);
    let results = SendResults::new("old".into(), rx);
    let _fresh = track(&ledger, "fresh");

    assert!(ledger.retry_candidates(Utc::now()).contains(&"fresh".to_string()));
    assert!(!ledger.retry_candidates(Utc::now()).contains(&"old".to_string()));

    assert_eq!(ledger.purge_expired(Utc::now()), 1);
    assert!(!ledger.contains("old"));
    assert!(ledger.contains("fresh"));
    assert!(matches!(
        results.outcome().await,
        Some(SendResult::Failed { can_retry: false, .. })
    ));
}

#[tokio::test]
async fn test_clear_fails_everything() {
    let ledger = ledger();
    let a = track(&ledger, "a");
    let b = track(&ledger, "b");

    assert_eq!(ledger.clear(), 2);
    assert!(ledger.is_empty());
    for results in [a, b] {
        let outcome = results.outcome().await.unwrap();
        assert!(matches!(outcome, SendResult::Failed { can_retry: false, .. }));
    }
}

#[tokio::test]
async fn test_outcome_returns_last_when_stream_ends() {
    let (tx, rx) = mpsc::unbounded_channel();
    let results = SendResults::new("m".into(), rx);
    tx.send(SendResult::Failed {
        message_id: "m".into(),
        error: "not connected".into(),
        can_retry: true,
    })
    .unwrap();
    drop(tx);

    assert!(matches!(
        results.outcome().await,
        Some(SendResult::Failed { can_retry: true, .. })
    ));
}
