// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sending data frames over the relay with acknowledgment tracking.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fieldsync_core::Frame;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::connection::ConnectionManager;
use super::ledger::{PendingLedger, PendingMessage, SendResult, SendResults};
use crate::error::Error;

/// Sends data frames through a [`ConnectionManager`] and tracks them in its ledger.
#[derive(Clone)]
pub struct MessageSender {
    connection: ConnectionManager,
    send_timeout: Duration,
}

impl MessageSender {
    pub fn new(connection: ConnectionManager, send_timeout: Duration) -> Self {
        MessageSender {
            connection,
            send_timeout,
        }
    }

    fn ledger(&self) -> &Arc<PendingLedger> {
        self.connection.ledger()
    }

    /// Sends one payload and returns the stream of its delivery results.
    ///
    /// Without a live connection the stream holds a single retryable
    /// `Failed` and nothing is recorded. Otherwise the message is recorded
    /// before the write and the stream reports `Sent` (or `Pending` when the
    /// write outlasts the send timeout), followed by `Acknowledged` or a
    /// terminal `Failed` once the relay answers.
    pub async fn send(&self, data_type: &str, payload: Value) -> SendResults {
        let message_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        let results = SendResults::new(message_id.clone(), rx);

        if !self.connection.is_connected() {
            let _ = tx.send(SendResult::Failed {
                message_id,
                error: "not connected".to_string(),
                can_retry: true,
            });
            return results;
        }

        self.ledger().insert(
            PendingMessage::new(&message_id, data_type, payload.clone()),
            tx,
        );

        let frame = Frame::data(&message_id, data_type, payload);
        match tokio::time::timeout(self.send_timeout, self.connection.send_frame(frame)).await {
            Ok(Ok(())) => {
                self.ledger()
                    .notify(&message_id, SendResult::Sent(message_id.clone()));
            }
            Ok(Err(e)) => {
                tracing::warn!("failed to send {} {}: {}", data_type, message_id, e);
                self.ledger().fail(&message_id, e.to_string(), true);
            }
            Err(_) => {
                tracing::debug!("send of {} still in flight after timeout", message_id);
                self.ledger()
                    .notify(&message_id, SendResult::Pending(message_id.clone()));
            }
        }
        results
    }

    /// Resends every pending message that is neither expired nor out of
    /// retries. Returns how many were resent.
    pub async fn retry_failed_messages(&self) -> usize {
        if !self.connection.is_connected() {
            return 0;
        }

        let mut resent = 0;
        for message_id in self.ledger().retry_candidates(Utc::now()) {
            let Some(message) = self.ledger().begin_retry(&message_id) else {
                continue;
            };
            let frame = Frame::data(&message.message_id, &message.data_type, message.payload);
            match self.connection.send_frame(frame).await {
                Ok(()) => {
                    resent += 1;
                    self.ledger()
                        .notify(&message_id, SendResult::Sent(message_id.clone()));
                }
                Err(Error::NotConnected) => break,
                Err(e) => tracing::warn!(
                    "retry {} of {} failed: {}",
                    message.retry_count,
                    message_id,
                    e
                ),
            }
        }
        if resent > 0 {
            tracing::info!("resent {} pending messages", resent);
        }
        resent
    }

    /// Fails and removes messages older than the ttl.
    pub fn purge_expired(&self) -> usize {
        self.ledger().purge_expired(Utc::now())
    }

    pub fn pending_message_count(&self) -> usize {
        self.ledger().len()
    }

    pub fn clear_pending_messages(&self) -> usize {
        self.ledger().clear()
    }
}

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
