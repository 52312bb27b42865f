// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Full and differential sync runs.
//!
//! A run is spawned as its own task and reports through a [`SyncEvents`]
//! stream: any number of `Progress` lines, then an elapsed-time line and
//! exactly one `Success` or `Error`.
//!
//! - Full sync pages through every catalog the account is entitled to,
//!   ingests each page stamped with the run's start time and, when every
//!   page was read, prunes rows older than that start time.
//! - Differential sync pushes unsent documents, one category at a time,
//!   over HTTP or over the relay depending on the account.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use fieldsync_core::{
    CatalogCursor, CatalogKind, CheckpointKind, Document, DocumentCategory, PushResult,
    TransportKind,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::api::ApiError;
use super::ingest::IngestReport;
use super::ledger::SendResult;
use super::session::Session;
use crate::error::{Error, Result};

/// One line of a sync run's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Progress(String),
    Error(String),
    Success(String),
}

impl SyncEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncEvent::Progress(_))
    }

    pub fn label(&self) -> &str {
        match self {
            SyncEvent::Progress(label) | SyncEvent::Error(label) | SyncEvent::Success(label) => {
                label
            }
        }
    }
}

/// Handle on a running sync: its events and a way to stop it.
pub struct SyncEvents {
    rx: mpsc::UnboundedReceiver<SyncEvent>,
    cancel: CancellationToken,
}

impl SyncEvents {
    /// Next event, or `None` after the terminal one.
    pub async fn next(&mut self) -> Option<SyncEvent> {
        self.rx.recv().await
    }

    /// Stops the run at its next suspension point. The run then ends with
    /// an error event.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the run to finish and returns every event it emitted.
    pub async fn collect(mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunKind {
    Full,
    Differential,
}

struct Reporter {
    tx: mpsc::UnboundedSender<SyncEvent>,
    started: Instant,
}

impl Reporter {
    fn progress(&self, label: impl Into<String>) {
        let label = label.into();
        tracing::info!("{}", label);
        let _ = self.tx.send(SyncEvent::Progress(label));
    }

    fn finish(self, result: Result<()>) {
        self.progress(format!(
            "finished in {:.1}s",
            self.started.elapsed().as_secs_f64()
        ));
        let terminal = match result {
            Ok(()) => SyncEvent::Success(String::new()),
            Err(e) => {
                tracing::error!("sync failed: {}", e);
                SyncEvent::Error(e.to_string())
            }
        };
        let _ = self.tx.send(terminal);
    }
}

pub(crate) fn spawn(session: Arc<Session>, kind: RunKind) -> SyncEvents {
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        let reporter = Reporter {
            tx,
            started: Instant::now(),
        };
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            result = run(&session, kind, &reporter) => result,
        };
        reporter.finish(result);
    });

    SyncEvents { rx, cancel }
}

async fn run(session: &Session, kind: RunKind, reporter: &Reporter) -> Result<()> {
    prepare(session).await?;
    match kind {
        RunKind::Full => full_sync(session, reporter).await,
        RunKind::Differential => differential_sync(session, reporter).await,
    }
}

/// Checks the account and fetches a token when none is cached.
async fn prepare(session: &Session) -> Result<()> {
    let account = session.account();
    account.validate_http()?;
    if account.needs_token() {
        session.refresh_token().await?;
    }
    Ok(())
}

async fn full_sync(session: &Session, reporter: &Reporter) -> Result<()> {
    let started_at = Utc::now().timestamp_millis();
    let account = session.account();
    let mut complete = true;

    for catalog in CatalogKind::sync_order(&account.flags()) {
        let pulled = pull_catalog(session, catalog, started_at).await?;
        tracing::debug!("{}: {}", catalog, pulled.report.counters);
        reporter.progress(format!("{}: {}", catalog, pulled.report.received));
        complete &= pulled.complete;
    }

    if !complete {
        tracing::warn!("full sync was incomplete; keeping existing records");
        return Ok(());
    }

    let pruned = session.ingestor().clean_up(&account.id, started_at);
    if pruned > 0 {
        tracing::info!("removed {} records no longer on the server", pruned);
    }
    save_checkpoint(session, &account.id, CheckpointKind::Full, started_at);
    Ok(())
}

struct Pulled {
    report: IngestReport,
    /// False when a page could not be read and paging stopped early, or a
    /// page could not be stored.
    complete: bool,
}

async fn pull_catalog(session: &Session, catalog: CatalogKind, started_at: i64) -> Result<Pulled> {
    let mut report = IngestReport::default();
    let mut cursor: Option<CatalogCursor> = None;
    let mut refreshed = false;

    loop {
        let account = session.account();
        let page = match session.api().fetch_page(&account, catalog, cursor).await {
            Ok(page) => page,
            Err(ApiError::Unauthorized(_)) if !refreshed => {
                refreshed = true;
                session.refresh_token().await?;
                continue;
            }
            Err(ApiError::Unauthorized(status)) => {
                return Err(Error::Authentication(format!(
                    "{} refused a fresh token (status {})",
                    catalog, status
                )));
            }
            Err(ApiError::Decode(reason)) => {
                tracing::warn!("skipping rest of {}: {}", catalog, reason);
                return Ok(Pulled {
                    report,
                    complete: false,
                });
            }
            Err(e) => return Err(e.into()),
        };

        report.merge(&session.ingestor().ingest(&account.id, &page.data, started_at));

        match page.more {
            None => break,
            Some(next) if Some(next) == cursor => {
                tracing::warn!("{} repeated cursor {}; stopping", catalog, next);
                return Ok(Pulled {
                    report,
                    complete: false,
                });
            }
            Some(next) => cursor = Some(next),
        }
    }

    if report.store_failed {
        tracing::warn!("{}: some records were not stored", catalog);
    }
    Ok(Pulled {
        complete: !report.store_failed,
        report,
    })
}

async fn differential_sync(session: &Session, reporter: &Reporter) -> Result<()> {
    let account = session.account();
    if !account.can_write() {
        return Err(Error::WriteNotAllowed(account.id));
    }

    let transport = account.transport();
    tracing::info!("pushing documents over {}", transport);
    if transport == TransportKind::Relay {
        ensure_connected(session).await?;
    }

    for category in DocumentCategory::ALL {
        let documents = session.store().fetch_unsent(&account.id, category)?;
        if documents.is_empty() {
            continue;
        }
        let delivered = match transport {
            TransportKind::Http => push_http(session, category, &documents).await?,
            TransportKind::Relay => push_relay(session, category, &documents, reporter).await,
        };
        reporter.progress(format!(
            "{}: {}/{}",
            category.endpoint(),
            delivered,
            documents.len()
        ));
    }

    save_checkpoint(
        session,
        &account.id,
        CheckpointKind::Differential,
        Utc::now().timestamp_millis(),
    );
    Ok(())
}

async fn ensure_connected(session: &Session) -> Result<()> {
    let expired = session.sender().purge_expired();
    if expired > 0 {
        tracing::info!("dropped {} expired pending messages", expired);
    }
    if session.connection().is_connected() {
        return Ok(());
    }
    session.connect().await?;
    tokio::time::sleep(session.stabilization()).await;
    if !session.connection().is_connected() {
        return Err(Error::NotConnected);
    }
    Ok(())
}

/// Pushes each document over HTTP. Returns how many the server accepted.
///
/// A bad response skips that document; a request that never got one, or a
/// refused token, aborts the run.
async fn push_http(
    session: &Session,
    category: DocumentCategory,
    documents: &[Document],
) -> Result<usize> {
    let account = session.account();
    let mut accepted = 0;
    for document in documents {
        let pushed = session
            .api()
            .push_document(&account, category, document.to_wire())
            .await;
        let response = match pushed {
            Ok(response) => response,
            Err(e @ (ApiError::Decode(_) | ApiError::Status { .. })) => {
                tracing::warn!("skipping {} {}: {}", category, document.id, e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        match response.outcome() {
            PushResult::Ok => {
                if let Some(warning) = &response.warning {
                    tracing::warn!("{} {}: {}", category, document.id, warning);
                }
                if session
                    .ingestor()
                    .mark_sent(&account.id, category, &document.id)
                {
                    accepted += 1;
                }
            }
            PushResult::Error => tracing::warn!(
                "server rejected {} {}: {}",
                category,
                document.id,
                response.message.as_deref().unwrap_or("no message")
            ),
            PushResult::Unknown(code) => tracing::warn!(
                "unexpected result '{}' for {} {}",
                code,
                category,
                document.id
            ),
        }
    }
    Ok(accepted)
}

/// Sends each document through the relay. Returns how many were handed off.
///
/// Documents are marked sent by acknowledgment watchers, not here.
async fn push_relay(
    session: &Session,
    category: DocumentCategory,
    documents: &[Document],
    reporter: &Reporter,
) -> usize {
    let account_id = session.account().id;
    let mut handed_off = 0;
    for document in documents {
        let mut results = session
            .sender()
            .send(category.as_str(), document.to_wire())
            .await;
        match results.next().await {
            Some(SendResult::Sent(_)) => {
                handed_off += 1;
                session.watch_acknowledgment(results, category, document.id.clone());
            }
            Some(SendResult::Acknowledged(_)) => {
                handed_off += 1;
                session
                    .ingestor()
                    .mark_sent(&account_id, category, &document.id);
            }
            Some(SendResult::Pending(id)) => {
                tracing::info!("{} {} still in flight as {}", category, document.id, id);
                session.watch_acknowledgment(results, category, document.id.clone());
            }
            Some(SendResult::Failed { error, .. }) => {
                reporter.progress(format!("{} {}: failed ({})", category, document.id, error));
            }
            None => tracing::warn!("{} {}: no send result", category, document.id),
        }
    }
    handed_off
}

fn save_checkpoint(session: &Session, account_id: &str, kind: CheckpointKind, at: i64) {
    if let Err(e) = session.store().save_checkpoint(account_id, kind, at) {
        tracing::warn!("failed to save sync checkpoint: {}", e);
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
