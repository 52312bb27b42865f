// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! One active account and everything needed to sync it.
//!
//! A [`Session`] is created per account and torn down on account switch. It
//! owns the account's relay connection, the sender tracking its in-flight
//! messages and the ingestor writing to the local store. Sync runs borrow the
//! session; nothing here is global.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fieldsync_core::{Account, DocumentCategory, LocalStore, RecordKind};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::api::{HttpApi, RemoteApi};
use super::connection::{ConnectionManager, IncomingData};
use super::delivery::MessageSender;
use super::ingest::Ingestor;
use super::ledger::{PendingLedger, SendResult, SendResults};
use super::orchestrator::{self, RunKind, SyncEvents};
use crate::config::Config;
use crate::error::{Error, Result};

/// Timing knobs for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// A relay write not confirmed within this window reports `Pending`.
    pub send_timeout: Duration,
    /// Pause after connecting before documents are pushed.
    pub stabilization: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            send_timeout: Duration::from_millis(5_000),
            stabilization: Duration::from_millis(500),
        }
    }
}

pub struct Session {
    account: RwLock<Account>,
    store: Arc<dyn LocalStore>,
    api: Arc<dyn RemoteApi>,
    connection: ConnectionManager,
    sender: MessageSender,
    ingestor: Ingestor,
    options: SessionOptions,
    applier: Mutex<Option<JoinHandle<()>>>,
    /// Acknowledgment watchers still waiting on the relay.
    watching: Arc<AtomicUsize>,
}

impl Session {
    /// Builds a session from the configuration file, talking HTTP with
    /// reqwest and WebSockets with tungstenite.
    pub fn open(config: &Config, account: Account, store: Arc<dyn LocalStore>) -> Result<Arc<Self>> {
        let api = HttpApi::new(config.http.timeout())?;
        let ledger = Arc::new(PendingLedger::new(
            config.delivery.message_ttl(),
            config.delivery.max_retries,
        ));
        let connection =
            ConnectionManager::new(config.connection.to_connection_config(), ledger);
        let options = SessionOptions {
            send_timeout: config.delivery.send_timeout(),
            stabilization: config.connection.stabilization(),
        };
        Ok(Self::new(account, store, Arc::new(api), connection, options))
    }

    /// Builds a session from explicit parts.
    pub fn new(
        account: Account,
        store: Arc<dyn LocalStore>,
        api: Arc<dyn RemoteApi>,
        connection: ConnectionManager,
        options: SessionOptions,
    ) -> Arc<Self> {
        let sender = MessageSender::new(connection.clone(), options.send_timeout);
        let ingestor = Ingestor::new(store.clone());
        Arc::new(Session {
            account: RwLock::new(account),
            store,
            api,
            connection,
            sender,
            ingestor,
            options,
            applier: Mutex::new(None),
            watching: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Snapshot of the account, including the latest token.
    pub fn account(&self) -> Account {
        self.account.read().clone()
    }

    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    pub fn api(&self) -> &Arc<dyn RemoteApi> {
        &self.api
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn sender(&self) -> &MessageSender {
        &self.sender
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    pub fn stabilization(&self) -> Duration {
        self.options.stabilization
    }

    /// Starts applying pushed records, then connects to the relay.
    ///
    /// The applier outlives a failed handshake, so records pushed after an
    /// automatic reconnect are still stored.
    pub async fn connect(&self) -> Result<bool> {
        self.start_incoming_applier();
        let account = self.account();
        self.connection.connect(&account).await
    }

    /// Waits up to `limit` for acknowledgment watchers to resolve. Returns
    /// how many are still waiting.
    pub async fn settle(&self, limit: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let waiting = self.watching.load(Ordering::Acquire);
            if waiting == 0 || tokio::time::Instant::now() >= deadline {
                return waiting;
            }
            tokio::time::sleep(SETTLE_POLL).await;
        }
    }

    /// Disconnects and drops every pending message.
    pub async fn close(&self) {
        if let Some(task) = self.applier.lock().take() {
            task.abort();
        }
        self.connection.disconnect().await;
    }

    /// Exchanges credentials for a fresh token and capability flags.
    pub async fn refresh_token(&self) -> Result<()> {
        let account = self.account();
        tracing::info!("requesting token for {}", account.id);
        let grant = self
            .api
            .request_token(&account)
            .await
            .map_err(|e| Error::Authentication(e.to_string()))?;

        let mut account = self.account.write();
        account.token = Some(grant.token);
        account.flags = Some(grant.flags);
        Ok(())
    }

    /// Pulls every catalog and prunes what the server no longer reports.
    pub fn update_all(self: &Arc<Self>) -> SyncEvents {
        orchestrator::spawn(self.clone(), RunKind::Full)
    }

    /// Pushes every unsent document.
    pub fn update_differential(self: &Arc<Self>) -> SyncEvents {
        orchestrator::spawn(self.clone(), RunKind::Differential)
    }

    /// Spawns the task applying data frames pushed by the relay. Idempotent.
    pub fn start_incoming_applier(&self) {
        let mut applier = self.applier.lock();
        if applier.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let mut incoming = self.connection.subscribe_incoming();
        let ingestor = self.ingestor.clone();
        let account_id = self.account.read().id.clone();
        *applier = Some(tokio::spawn(async move {
            loop {
                match incoming.recv().await {
                    Ok(data) => apply_incoming(&ingestor, &account_id, data),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("missed {} pushed frames", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
    }

    /// Marks the document sent once the relay acknowledges it.
    pub fn watch_acknowledgment(
        &self,
        results: SendResults,
        category: DocumentCategory,
        id: String,
    ) -> JoinHandle<()> {
        let ingestor = self.ingestor.clone();
        let account_id = self.account.read().id.clone();
        let done = Watched::start(&self.watching);
        tokio::spawn(async move {
            let _done = done;
            match results.outcome().await {
                Some(SendResult::Acknowledged(_)) => {
                    if ingestor.mark_sent(&account_id, category, &id) {
                        tracing::debug!("{} {} acknowledged", category, id);
                    }
                }
                Some(SendResult::Failed { error, .. }) => {
                    tracing::warn!("{} {} was not delivered: {}", category, id, error);
                }
                other => tracing::debug!("{} {} left unresolved: {:?}", category, id, other),
            }
        })
    }
}

const SETTLE_POLL: Duration = Duration::from_millis(20);

/// Counts a watcher as resolved when its task ends, aborted or not.
struct Watched(Arc<AtomicUsize>);

impl Watched {
    fn start(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::AcqRel);
        Watched(Arc::clone(count))
    }
}

impl Drop for Watched {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Ingests a data frame whose type names a catalog record kind.
fn apply_incoming(ingestor: &Ingestor, account_id: &str, data: IncomingData) {
    if data.data_type.parse::<RecordKind>().is_err() {
        tracing::debug!("ignoring pushed {} frame", data.data_type);
        return;
    }

    let tag = |mut value: Value| {
        if let Some(object) = value.as_object_mut() {
            object
                .entry("type")
                .or_insert_with(|| Value::String(data.data_type.clone()));
        }
        value
    };
    let batch: Vec<Value> = match data.payload {
        Value::Array(items) => items.into_iter().map(tag).collect(),
        other => vec![tag(other)],
    };

    let report = ingestor.ingest(account_id, &batch, Utc::now().timestamp_millis());
    tracing::info!(
        "applied pushed {}: {} stored, {} rejected",
        data.data_type,
        report.stored,
        report.rejected
    );
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
