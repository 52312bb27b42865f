// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests of the relay connection against an in-process
//! `fieldsync-relay` server on an ephemeral port.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fieldsync::sync::{
    ConnectionConfig, ConnectionManager, HttpApi, MessageSender, PendingLedger, SendResult,
    Session, SessionOptions, SyncEvent,
};
use fieldsync_core::{Account, AccountFlags, Database, Document, DocumentCategory, RecordKind};
use fieldsync_relay::RelayState;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

struct Relay {
    addr: SocketAddr,
    state: RelayState,
    task: JoinHandle<()>,
}

impl Relay {
    async fn start() -> Self {
        let state = RelayState::new();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let serve_state = state.clone();
        let task = tokio::spawn(async move {
            let _ = fieldsync_relay::serve(listener, serve_state).await;
        });
        Relay { addr, state, task }
    }

    fn account(&self, id: &str) -> Account {
        Account::new(id, "http://127.0.0.1:9")
            .with_relay_url(format!("ws://{}/ws", self.addr))
            .with_token("tok")
            .with_flags(AccountFlags {
                write_allowed: true,
                relay_enabled: true,
                ..AccountFlags::default()
            })
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn config() -> ConnectionConfig {
    ConnectionConfig {
        base_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(200),
        keepalive_interval: Duration::from_secs(3600),
        connect_timeout: Duration::from_secs(2),
        ..ConnectionConfig::default()
    }
}

fn manager() -> ConnectionManager {
    let ledger = Arc::new(PendingLedger::new(Duration::from_secs(60), 3));
    ConnectionManager::new(config(), ledger)
}

async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn relay_acknowledges_sent_message() {
    let relay = Relay::start().await;
    let connection = manager();
    assert!(connection.connect(&relay.account("a")).await.unwrap());
    assert!(connection.state().is_connected());

    let sender = MessageSender::new(connection.clone(), Duration::from_secs(2));
    let mut results = sender.send("order", json!({"id": "o-1"})).await;

    assert!(matches!(results.next().await, Some(SendResult::Sent(_))));
    let outcome = tokio::time::timeout(Duration::from_secs(5), results.outcome())
        .await
        .unwrap();
    assert!(matches!(outcome, Some(SendResult::Acknowledged(_))));
    assert_eq!(sender.pending_message_count(), 0);

    connection.disconnect().await;
}

#[tokio::test]
async fn data_reaches_other_clients() {
    let relay = Relay::start().await;
    let alice = manager();
    let bob = manager();
    alice.connect(&relay.account("alice")).await.unwrap();
    bob.connect(&relay.account("bob")).await.unwrap();
    let mut incoming = bob.subscribe_incoming();
    let state = relay.state.clone();
    assert!(eventually(move || state.connected_clients() == 2).await);

    let sender = MessageSender::new(alice.clone(), Duration::from_secs(2));
    sender.send("client", json!({"guid": "c-1"})).await;

    let data = tokio::time::timeout(Duration::from_secs(5), incoming.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(data.data_type, "client");
    assert_eq!(data.payload, json!({"guid": "c-1"}));

    alice.disconnect().await;
    bob.disconnect().await;
}

#[tokio::test]
async fn unacknowledged_message_is_retried() {
    let relay = Relay::start().await;
    relay.state.set_ack_data(false);
    let connection = manager();
    connection.connect(&relay.account("a")).await.unwrap();
    let sender = MessageSender::new(connection.clone(), Duration::from_secs(2));

    let mut results = sender.send("order", json!({"id": "o-1"})).await;
    assert!(matches!(results.next().await, Some(SendResult::Sent(_))));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sender.pending_message_count(), 1);

    relay.state.set_ack_data(true);
    assert_eq!(sender.retry_failed_messages().await, 1);

    let outcome = tokio::time::timeout(Duration::from_secs(5), results.outcome())
        .await
        .unwrap();
    assert!(matches!(outcome, Some(SendResult::Acknowledged(_))));
    assert_eq!(sender.pending_message_count(), 0);

    connection.disconnect().await;
}

#[tokio::test]
async fn differential_sync_over_relay_marks_documents_sent() {
    let relay = Relay::start().await;
    let db = Arc::new(Database::open_in_memory().unwrap());
    for id in ["o-1", "o-2"] {
        db.add_document(
            "agent",
            &Document::new(DocumentCategory::Order, id, json!({"total": 1})),
        )
        .unwrap();
    }
    let ledger = Arc::new(PendingLedger::new(Duration::from_secs(60), 3));
    let session = Session::new(
        relay.account("agent"),
        db.clone(),
        Arc::new(HttpApi::new(Duration::from_secs(1)).unwrap()),
        ConnectionManager::new(config(), ledger),
        SessionOptions {
            send_timeout: Duration::from_secs(2),
            stabilization: Duration::from_millis(20),
        },
    );

    let events = tokio::time::timeout(Duration::from_secs(10), session.update_differential().collect())
        .await
        .unwrap();

    assert!(events.contains(&SyncEvent::Progress("orders: 2/2".to_string())));
    assert_eq!(events.last(), Some(&SyncEvent::Success(String::new())));
    let store = db.clone();
    assert!(eventually(move || store.count_unsent("agent", DocumentCategory::Order).unwrap() == 0).await);

    session.close().await;
}

#[tokio::test]
async fn pushed_catalog_records_are_stored() {
    let relay = Relay::start().await;
    let db = Arc::new(Database::open_in_memory().unwrap());
    let ledger = Arc::new(PendingLedger::new(Duration::from_secs(60), 3));
    let session = Session::new(
        relay.account("agent"),
        db.clone(),
        Arc::new(HttpApi::new(Duration::from_secs(1)).unwrap()),
        ConnectionManager::new(config(), ledger),
        SessionOptions::default(),
    );
    session.connect().await.unwrap();

    let office = manager();
    office.connect(&relay.account("office")).await.unwrap();
    let state = relay.state.clone();
    assert!(eventually(move || state.connected_clients() == 2).await);

    let sender = MessageSender::new(office.clone(), Duration::from_secs(2));
    sender
        .send("client", json!({"guid": "c-9", "name": "New shop"}))
        .await;

    let store = db.clone();
    assert!(eventually(move || store.count_records("agent", RecordKind::Client).unwrap() == 1).await);

    office.disconnect().await;
    session.close().await;
}
