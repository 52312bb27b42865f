// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-flight relay messages awaiting acknowledgment.
//!
//! Every data frame handed to the relay is recorded here together with the
//! channel its caller listens on. An entry leaves the ledger exactly once:
//! on acknowledgment, on a terminal failure, on expiry or when the ledger is
//! cleared. Removal and resolution happen under the same map operation, so a
//! message can never be resolved twice.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;

/// A data frame that was handed to the relay and not yet resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMessage {
    pub message_id: String,
    pub data_type: String,
    pub payload: Value,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

impl PendingMessage {
    pub fn new(message_id: impl Into<String>, data_type: impl Into<String>, payload: Value) -> Self {
        PendingMessage {
            message_id: message_id.into(),
            data_type: data_type.into(),
            payload,
            retry_count: 0,
            created_at: Utc::now(),
        }
    }
}

/// Delivery progress of one sent message.
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// Handed to the transport.
    Sent(String),
    /// Confirmed by the peer. Terminal.
    Acknowledged(String),
    /// Not delivered. Terminal when `can_retry` is false.
    Failed {
        message_id: String,
        error: String,
        can_retry: bool,
    },
    /// The transport did not confirm the write in time; the entry stays for retry.
    Pending(String),
}

impl SendResult {
    pub fn message_id(&self) -> &str {
        match self {
            SendResult::Sent(id) | SendResult::Acknowledged(id) | SendResult::Pending(id) => id,
            SendResult::Failed { message_id, .. } => message_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SendResult::Acknowledged(_)
                | SendResult::Failed {
                    can_retry: false,
                    ..
                }
        )
    }
}

struct Entry {
    message: PendingMessage,
    results: mpsc::UnboundedSender<SendResult>,
}

/// Concurrent map of unresolved messages keyed by message id.
pub struct PendingLedger {
    entries: DashMap<String, Entry>,
    ttl: Duration,
    max_retries: u32,
}

impl PendingLedger {
    pub fn new(ttl: std::time::Duration, max_retries: u32) -> Self {
        PendingLedger {
            entries: DashMap::new(),
            ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
            max_retries,
        }
    }

    pub fn insert(&self, message: PendingMessage, results: mpsc::UnboundedSender<SendResult>) {
        self.entries
            .insert(message.message_id.clone(), Entry { message, results });
    }

    /// Reports non-terminal progress for an entry that is still pending.
    ///
    /// Returns false when the entry has already been resolved.
    pub fn notify(&self, message_id: &str, result: SendResult) -> bool {
        match self.entries.get(message_id) {
            Some(entry) => {
                let _ = entry.results.send(result);
                true
            }
            None => false,
        }
    }

    /// Resolves an entry as acknowledged. Returns false for unknown ids.
    pub fn acknowledge(&self, message_id: &str) -> bool {
        match self.entries.remove(message_id) {
            Some((id, entry)) => {
                let _ = entry.results.send(SendResult::Acknowledged(id));
                true
            }
            None => false,
        }
    }

    /// Resolves an entry as failed. Returns false for unknown ids.
    pub fn fail(&self, message_id: &str, error: impl Into<String>, can_retry: bool) -> bool {
        match self.entries.remove(message_id) {
            Some((id, entry)) => {
                let _ = entry.results.send(SendResult::Failed {
                    message_id: id,
                    error: error.into(),
                    can_retry,
                });
                true
            }
            None => false,
        }
    }

    /// Ids of entries that are neither expired nor out of retries.
    pub fn retry_candidates(&self, now: DateTime<Utc>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| {
                let message = &entry.message;
                !self.is_expired(message, now) && message.retry_count < self.max_retries
            })
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Bumps the retry count of a pending entry and returns a copy to resend.
    pub fn begin_retry(&self, message_id: &str) -> Option<PendingMessage> {
        let mut entry = self.entries.get_mut(message_id)?;
        entry.message.retry_count += 1;
        Some(entry.message.clone())
    }

    /// Fails every entry older than the ttl. Returns how many were purged.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| self.is_expired(&entry.message, now))
            .map(|entry| entry.key().clone())
            .collect();

        expired
            .iter()
            .filter(|id| self.fail(id, "message expired", false))
            .count()
    }

    /// Fails every entry. Returns how many were cleared.
    pub fn clear(&self) -> usize {
        let ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        ids.iter()
            .filter(|id| self.fail(id, "pending messages cleared", false))
            .count()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, message_id: &str) -> Option<PendingMessage> {
        self.entries.get(message_id).map(|e| e.message.clone())
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, message_id: &str) -> bool {
        self.entries.contains_key(message_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, message: &PendingMessage, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(message.created_at) > self.ttl
    }
}

/// Receiving end of a send: the progress of one message.
///
/// The stream yields zero or more non-terminal results and ends after the
/// terminal one, or when the message leaves the ledger.
pub struct SendResults {
    message_id: String,
    rx: mpsc::UnboundedReceiver<SendResult>,
}

impl SendResults {
    pub(crate) fn new(message_id: String, rx: mpsc::UnboundedReceiver<SendResult>) -> Self {
        SendResults { message_id, rx }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Next progress update, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<SendResult> {
        self.rx.recv().await
    }

    /// Waits for the final result: the terminal one, or the last seen when
    /// the stream ends without one.
    pub async fn outcome(mut self) -> Option<SendResult> {
        let mut last = None;
        while let Some(result) = self.rx.recv().await {
            let terminal = result.is_terminal();
            last = Some(result);
            if terminal {
                break;
            }
        }
        last
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
