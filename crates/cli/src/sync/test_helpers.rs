// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for sync module tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fieldsync_core::{
    Account, AccountFlags, CatalogCursor, CatalogKind, CheckpointKind, Database, Document,
    DocumentCategory, Frame, LocalStore, PageResponse, PushResponse, RecordKind, SendStatus,
    StoredRecord, TokenGrant, UpsertOutcome,
};
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use super::api::{ApiError, ApiFuture, ApiResult, RemoteApi};
use super::connection::{ConnectionConfig, ConnectionState, TransportFactory};
use super::transport::{Transport, TransportError, TransportFuture, TransportResult};

/// Behaviour shared by every transport a [`MockRelay`] hands out.
#[derive(Default)]
struct Script {
    fail_connect: AtomicBool,
    fail_send: AtomicBool,
    hang_send: AtomicBool,
    auto_ack: AtomicBool,
    reject_data: AtomicBool,
    connects: AtomicU32,
    closes: AtomicU32,
    sent: Mutex<Vec<Frame>>,
    inbound: Mutex<Option<mpsc::UnboundedSender<TransportResult<Frame>>>>,
}

/// Scriptable stand-in for the relay server.
#[derive(Clone, Default)]
pub struct MockRelay {
    script: Arc<Script>,
}

impl MockRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> TransportFactory {
        let script = Arc::clone(&self.script);
        Arc::new(move || {
            Box::new(MockTransport {
                script: Arc::clone(&script),
                inbound: None,
            }) as Box<dyn Transport>
        })
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.script.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.script.fail_send.store(fail, Ordering::SeqCst);
    }

    /// Data frame writes never complete.
    pub fn set_hang_send(&self, hang: bool) {
        self.script.hang_send.store(hang, Ordering::SeqCst);
    }

    /// Answer every data frame with an ack.
    pub fn set_auto_ack(&self, ack: bool) {
        self.script.auto_ack.store(ack, Ordering::SeqCst);
    }

    /// Answer every data frame with an error frame.
    pub fn set_reject_data(&self, reject: bool) {
        self.script.reject_data.store(reject, Ordering::SeqCst);
    }

    pub fn connects(&self) -> u32 {
        self.script.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.script.closes.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Frame> {
        self.script.sent.lock().unwrap().clone()
    }

    pub fn sent_data(&self) -> Vec<Frame> {
        self.sent()
            .into_iter()
            .filter(|f| matches!(f, Frame::Data { .. }))
            .collect()
    }

    /// Deliver a frame to the connected client.
    pub fn push(&self, frame: Frame) -> bool {
        self.script.push(Ok(frame))
    }

    /// Deliver an undecodable frame to the connected client.
    pub fn push_garbage(&self) -> bool {
        self.script.push(Err(TransportError::SerializationError(
            "expected value at line 1 column 1".into(),
        )))
    }

    /// Drop the live connection as if the network went away.
    pub fn drop_connection(&self) {
        self.script.inbound.lock().unwrap().take();
    }
}

impl Script {
    fn push(&self, item: TransportResult<Frame>) -> bool {
        match self.inbound.lock().unwrap().as_ref() {
            Some(tx) => tx.send(item).is_ok(),
            None => false,
        }
    }
}

pub struct MockTransport {
    script: Arc<Script>,
    inbound: Option<Mutex<mpsc::UnboundedReceiver<TransportResult<Frame>>>>,
}

impl Transport for MockTransport {
    fn connect(&mut self, _url: &str) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.script.connects.fetch_add(1, Ordering::SeqCst);
            if self.script.fail_connect.load(Ordering::SeqCst) {
                return Err(TransportError::ConnectionFailed("mock refused".into()));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            *self.script.inbound.lock().unwrap() = Some(tx);
            self.inbound = Some(Mutex::new(rx));
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if self.inbound.take().is_some() {
                self.script.closes.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        })
    }

    fn send(&mut self, frame: Frame) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if self.inbound.is_none() {
                return Err(TransportError::ConnectionClosed);
            }
            if let Frame::Data { message_id, .. } = &frame {
                if self.script.hang_send.load(Ordering::SeqCst) {
                    std::future::pending::<()>().await;
                }
                if self.script.fail_send.load(Ordering::SeqCst) {
                    return Err(TransportError::SendFailed("mock send failure".into()));
                }
                if self.script.auto_ack.load(Ordering::SeqCst) {
                    self.script.push(Ok(Frame::ack(message_id.clone())));
                }
                if self.script.reject_data.load(Ordering::SeqCst) {
                    self.script
                        .push(Ok(Frame::error(Some(message_id.clone()), "rejected")));
                }
            }
            self.script.sent.lock().unwrap().push(frame);
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<Frame>> {
        Box::pin(async move {
            let rx = self
                .inbound
                .as_mut()
                .ok_or(TransportError::ConnectionClosed)?
                .get_mut()
                .unwrap();
            let next = rx.recv().await;
            match next {
                Some(item) => item.map(Some),
                None => {
                    self.inbound = None;
                    Ok(None)
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.inbound.is_some()
    }
}

/// Connection settings with short delays for tests.
pub fn fast_config() -> ConnectionConfig {
    ConnectionConfig {
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(80),
        max_backoff_shift: 6,
        max_reconnect_attempts: 0,
        keepalive_interval: Duration::from_secs(3600),
        connect_timeout: Duration::from_secs(1),
    }
}

/// An account that may push documents over the relay.
pub fn relay_account() -> Account {
    Account::new("acc", "http://127.0.0.1:9")
        .with_relay_url("ws://relay.test/ws")
        .with_token("token")
        .with_flags(AccountFlags {
            write_allowed: true,
            relay_enabled: true,
            ..AccountFlags::default()
        })
}

/// Wait until the connection state satisfies `predicate`.
pub async fn wait_for_state(
    rx: &mut watch::Receiver<ConnectionState>,
    predicate: impl Fn(&ConnectionState) -> bool,
) -> ConnectionState {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| predicate(s)))
        .await
        .expect("timed out waiting for connection state")
        .expect("state channel closed")
        .clone()
}

/// Poll `check` until it holds or a few seconds pass.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// [`RemoteApi`] answering from per-endpoint queues.
///
/// With an empty queue a token request is refused, a page is empty and final,
/// and a push succeeds.
#[derive(Default)]
pub struct ScriptedApi {
    tokens: Mutex<VecDeque<ApiResult<TokenGrant>>>,
    pages: Mutex<HashMap<CatalogKind, VecDeque<ApiResult<PageResponse>>>>,
    pushes: Mutex<VecDeque<ApiResult<PushResponse>>>,
    calls: Mutex<Vec<String>>,
    pushed: Mutex<Vec<(DocumentCategory, Value)>>,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn grant(&self, result: ApiResult<TokenGrant>) {
        self.tokens.lock().unwrap().push_back(result);
    }

    pub fn page(&self, catalog: CatalogKind, result: ApiResult<PageResponse>) {
        self.pages
            .lock()
            .unwrap()
            .entry(catalog)
            .or_default()
            .push_back(result);
    }

    pub fn push_reply(&self, result: ApiResult<PushResponse>) {
        self.pushes.lock().unwrap().push_back(result);
    }

    /// Calls in order, e.g. `token`, `clients`, `clients@5`, `push orders`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pushed(&self) -> Vec<(DocumentCategory, Value)> {
        self.pushed.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl RemoteApi for ScriptedApi {
    fn request_token<'a>(&'a self, _account: &'a Account) -> ApiFuture<'a, TokenGrant> {
        Box::pin(async move {
            self.record("token".into());
            self.tokens
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ApiError::Unauthorized(401)))
        })
    }

    fn fetch_page<'a>(
        &'a self,
        _account: &'a Account,
        catalog: CatalogKind,
        cursor: Option<CatalogCursor>,
    ) -> ApiFuture<'a, PageResponse> {
        Box::pin(async move {
            match cursor {
                Some(cursor) => self.record(format!("{}@{}", catalog, cursor)),
                None => self.record(catalog.to_string()),
            }
            self.pages
                .lock()
                .unwrap()
                .get_mut(&catalog)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Ok(page(Vec::new(), None)))
        })
    }

    fn push_document<'a>(
        &'a self,
        _account: &'a Account,
        category: DocumentCategory,
        body: Value,
    ) -> ApiFuture<'a, PushResponse> {
        Box::pin(async move {
            self.record(format!("push {}", category.endpoint()));
            self.pushed.lock().unwrap().push((category, body));
            self.pushes.lock().unwrap().pop_front().unwrap_or_else(|| {
                Ok(PushResponse {
                    result: "ok".into(),
                    ..PushResponse::default()
                })
            })
        })
    }
}

pub fn page(data: Vec<Value>, more: Option<u64>) -> PageResponse {
    PageResponse {
        data,
        more: more.map(CatalogCursor::new),
    }
}

pub fn grant(token: &str, flags: AccountFlags) -> TokenGrant {
    TokenGrant {
        token: token.to_string(),
        flags,
    }
}

/// Store whose upserts of one kind always fail.
pub struct FailingStore {
    pub inner: Arc<Database>,
    pub fail_kind: RecordKind,
}

impl LocalStore for FailingStore {
    fn upsert(
        &self,
        account_id: &str,
        records: &[StoredRecord],
    ) -> fieldsync_core::Result<UpsertOutcome> {
        if records.iter().any(|r| r.kind == self.fail_kind) {
            return Err(fieldsync_core::Error::CorruptedData("disk full".into()));
        }
        self.inner.upsert(account_id, records)
    }

    fn delete_older_than(
        &self,
        account_id: &str,
        kind: RecordKind,
        cutoff: i64,
    ) -> fieldsync_core::Result<usize> {
        self.inner.delete_older_than(account_id, kind, cutoff)
    }

    fn fetch_unsent(
        &self,
        account_id: &str,
        category: DocumentCategory,
    ) -> fieldsync_core::Result<Vec<Document>> {
        self.inner.fetch_unsent(account_id, category)
    }

    fn mark_sent(
        &self,
        account_id: &str,
        category: DocumentCategory,
        id: &str,
        status: SendStatus,
    ) -> fieldsync_core::Result<()> {
        self.inner.mark_sent(account_id, category, id, status)
    }

    fn save_checkpoint(
        &self,
        account_id: &str,
        kind: CheckpointKind,
        at: i64,
    ) -> fieldsync_core::Result<()> {
        self.inner.save_checkpoint(account_id, kind, at)
    }
}

impl FailingStore {
    pub fn new(fail_kind: RecordKind) -> Arc<Self> {
        Arc::new(FailingStore {
            inner: Arc::new(Database::open_in_memory().unwrap()),
            fail_kind,
        })
    }
}
