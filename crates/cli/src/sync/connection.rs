// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Relay connection lifecycle.
//!
//! [`ConnectionManager`] owns at most one live relay session. The session
//! runs as a background task that multiplexes outbound frames, keep-alive
//! pings and inbound frames over a single [`Transport`]. Connection state is
//! published on a watch channel; inbound data frames are published on a
//! broadcast channel after being acknowledged to the relay.
//!
//! When a session ends abnormally the manager schedules reconnects with
//! capped exponential backoff. The pending ledger survives reconnects and is
//! only cleared by an explicit [`ConnectionManager::disconnect`].

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fieldsync_core::{Account, Frame};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::ledger::PendingLedger;
use super::transport::{Transport, TransportError, TransportResult, WebSocketTransport};
use crate::error::{Error, Result};

const OUTBOUND_CAPACITY: usize = 64;
const INCOMING_CAPACITY: usize = 256;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Lifecycle of the relay connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting { attempt: u32 },
    Connected { session_id: String },
    Reconnecting { delay_ms: u64, attempt: u32 },
    Error { message: String, can_retry: bool },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }

    /// Get a human-readable status string.
    pub fn status_string(&self) -> String {
        match self {
            ConnectionState::Disconnected => "disconnected".to_string(),
            ConnectionState::Connecting { attempt } if *attempt > 1 => {
                format!("connecting (attempt {})", attempt)
            }
            ConnectionState::Connecting { .. } => "connecting".to_string(),
            ConnectionState::Connected { session_id } => format!("connected ({})", session_id),
            ConnectionState::Reconnecting { delay_ms, attempt } => {
                format!("reconnecting in {}ms (attempt {})", delay_ms, attempt)
            }
            ConnectionState::Error { message, can_retry } => {
                if *can_retry {
                    format!("error: {}", message)
                } else {
                    format!("error: {} (not retrying)", message)
                }
            }
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status_string())
    }
}

/// Configuration for the connection manager.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Upper bound for any reconnect delay.
    pub max_delay: Duration,
    /// Largest power of two applied to the base delay.
    pub max_backoff_shift: u32,
    /// Consecutive failures before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
    pub keepalive_interval: Duration,
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(60_000),
            max_backoff_shift: 6,
            max_reconnect_attempts: 0,
            keepalive_interval: Duration::from_millis(30_000),
            connect_timeout: Duration::from_millis(10_000),
        }
    }
}

impl ConnectionConfig {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let shift = attempt
            .saturating_sub(1)
            .min(self.max_backoff_shift)
            .min(31);
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

/// A data frame received from the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingData {
    pub message_id: String,
    pub data_type: String,
    pub payload: Value,
}

/// Builds a fresh transport for every connection attempt.
pub type TransportFactory = Arc<dyn Fn() -> Box<dyn Transport> + Send + Sync>;

struct Outbound {
    frame: Frame,
    done: oneshot::Sender<TransportResult<()>>,
}

struct SessionHandle {
    generation: u64,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Link {
    /// Endpoint of the last explicit connect, reused by reconnects.
    endpoint: Option<String>,
    outbound: Option<mpsc::Sender<Outbound>>,
    session: Option<SessionHandle>,
    reconnect: Option<CancellationToken>,
}

struct Inner {
    config: ConnectionConfig,
    factory: TransportFactory,
    ledger: Arc<PendingLedger>,
    state: watch::Sender<ConnectionState>,
    incoming: broadcast::Sender<IncomingData>,
    /// Consecutive failed attempts since the last successful connect.
    failures: AtomicU32,
    generation: AtomicU64,
    link: Mutex<Link>,
}

/// Owns the relay session and its reconnect policy.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a manager that connects over real WebSockets.
    pub fn new(config: ConnectionConfig, ledger: Arc<PendingLedger>) -> Self {
        let factory: TransportFactory =
            Arc::new(|| Box::new(WebSocketTransport::new()) as Box<dyn Transport>);
        Self::with_transport(config, ledger, factory)
    }

    /// Create a manager with a custom transport factory.
    pub fn with_transport(
        config: ConnectionConfig,
        ledger: Arc<PendingLedger>,
        factory: TransportFactory,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (incoming, _) = broadcast::channel(INCOMING_CAPACITY);
        ConnectionManager {
            inner: Arc::new(Inner {
                config,
                factory,
                ledger,
                state,
                incoming,
                failures: AtomicU32::new(0),
                generation: AtomicU64::new(0),
                link: Mutex::new(Link::default()),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Subscribe to data frames pushed by the relay.
    pub fn subscribe_incoming(&self) -> broadcast::Receiver<IncomingData> {
        self.inner.incoming.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.borrow().is_connected()
    }

    pub fn ledger(&self) -> &Arc<PendingLedger> {
        &self.inner.ledger
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Connect to the account's relay.
    ///
    /// Returns `Ok(false)` without a new handshake when already connected.
    /// A failed attempt publishes an error state, schedules a reconnect and
    /// returns the error.
    pub async fn connect(&self, account: &Account) -> Result<bool> {
        if self.is_connected() {
            tracing::debug!("already connected to relay");
            return Ok(false);
        }

        let endpoint = match account.relay_endpoint() {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.set_state(ConnectionState::Error {
                    message: e.to_string(),
                    can_retry: false,
                });
                return Err(e.into());
            }
        };

        self.cancel_reconnect();
        self.inner.link.lock().endpoint = Some(endpoint.clone());
        self.inner.failures.store(0, Ordering::Release);
        self.open_or_schedule(&endpoint).await
    }

    /// Retry immediately, resetting the backoff counter.
    pub async fn reconnect(&self) -> Result<bool> {
        if self.is_connected() {
            return Ok(false);
        }
        self.cancel_reconnect();
        let endpoint = self
            .inner
            .link
            .lock()
            .endpoint
            .clone()
            .ok_or(Error::NotConnected)?;
        self.inner.failures.store(0, Ordering::Release);
        self.open_or_schedule(&endpoint).await
    }

    /// Close the session with a normal closure, stop reconnecting and fail
    /// every pending message.
    pub async fn disconnect(&self) {
        let (session, reconnect) = {
            let mut link = self.inner.link.lock();
            link.endpoint = None;
            link.outbound = None;
            (link.session.take(), link.reconnect.take())
        };

        if let Some(token) = reconnect {
            token.cancel();
        }
        if let Some(session) = session {
            session.cancel.cancel();
            if let Some(task) = session.task {
                let _ = tokio::time::timeout(SHUTDOWN_GRACE, task).await;
            }
        }

        let cleared = self.inner.ledger.clear();
        if cleared > 0 {
            tracing::info!("dropped {} pending messages on disconnect", cleared);
        }
        self.inner.failures.store(0, Ordering::Release);
        self.set_state(ConnectionState::Disconnected);
    }

    /// Hand a frame to the live session and wait for the transport write.
    pub async fn send_frame(&self, frame: Frame) -> Result<()> {
        let outbound = self
            .inner
            .link
            .lock()
            .outbound
            .clone()
            .ok_or(Error::NotConnected)?;
        let (done, written) = oneshot::channel();
        outbound
            .send(Outbound { frame, done })
            .await
            .map_err(|_| Error::NotConnected)?;
        written.await.map_err(|_| Error::NotConnected)??;
        Ok(())
    }

    fn set_state(&self, state: ConnectionState) {
        tracing::debug!("relay connection: {}", state);
        self.inner.state.send_replace(state);
    }

    fn cancel_reconnect(&self) {
        if let Some(token) = self.inner.link.lock().reconnect.take() {
            token.cancel();
        }
    }

    async fn open_or_schedule(&self, endpoint: &str) -> Result<bool> {
        match self.open(endpoint).await {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::warn!("relay connection failed: {}", e);
                if self.record_failure(&e.to_string()) {
                    self.spawn_reconnect();
                }
                Err(e.into())
            }
        }
    }

    /// One connection attempt. Starts a session on success.
    async fn open(&self, endpoint: &str) -> TransportResult<()> {
        let attempt = self.inner.failures.load(Ordering::Acquire) + 1;
        self.set_state(ConnectionState::Connecting { attempt });

        let mut transport = (self.inner.factory)();
        let timeout = self.inner.config.connect_timeout;
        let result = tokio::time::timeout(timeout, transport.connect(endpoint)).await;
        match result {
            Ok(Ok(())) => {
                self.inner.failures.store(0, Ordering::Release);
                self.start_session(transport);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(TransportError::ConnectionFailed(format!(
                "timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }

    /// Counts a failed attempt and publishes the error state.
    ///
    /// Returns whether another attempt should be scheduled.
    fn record_failure(&self, message: &str) -> bool {
        let failures = self.inner.failures.fetch_add(1, Ordering::AcqRel) + 1;
        let limit = self.inner.config.max_reconnect_attempts;
        if limit > 0 && failures >= limit {
            tracing::warn!("giving up on relay after {} failed attempts", failures);
            self.set_state(ConnectionState::Error {
                message: format!("{} (gave up after {} attempts)", message, failures),
                can_retry: false,
            });
            return false;
        }
        self.set_state(ConnectionState::Error {
            message: message.to_string(),
            can_retry: true,
        });
        true
    }

    fn spawn_reconnect(&self) {
        let token = CancellationToken::new();
        if let Some(previous) = self.inner.link.lock().reconnect.replace(token.clone()) {
            previous.cancel();
        }
        let manager = self.clone();
        tokio::spawn(async move { manager.reconnect_loop(token).await });
    }

    async fn reconnect_loop(self, token: CancellationToken) {
        loop {
            let attempt = self.inner.failures.load(Ordering::Acquire);
            let delay = self.inner.config.backoff_delay(attempt);
            self.set_state(ConnectionState::Reconnecting {
                delay_ms: delay.as_millis() as u64,
                attempt,
            });

            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            let endpoint = self.inner.link.lock().endpoint.clone();
            let Some(endpoint) = endpoint else { return };
            if self.is_connected() {
                return;
            }

            let result = tokio::select! {
                _ = token.cancelled() => return,
                result = self.open(&endpoint) => result,
            };
            match result {
                Ok(()) => {
                    tracing::info!("reconnected to relay after {} attempts", attempt);
                    return;
                }
                Err(e) => {
                    tracing::warn!("relay reconnect failed: {}", e);
                    if !self.record_failure(&e.to_string()) {
                        return;
                    }
                }
            }
        }
    }

    fn start_session(&self, transport: Box<dyn Transport>) {
        let (outbound, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let cancel = CancellationToken::new();
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let session_id = Uuid::new_v4().to_string();

        let previous = {
            let mut link = self.inner.link.lock();
            link.outbound = Some(outbound);
            link.session.replace(SessionHandle {
                generation,
                cancel: cancel.clone(),
                task: None,
            })
        };
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }

        tracing::info!("connected to relay, session {}", session_id);
        self.set_state(ConnectionState::Connected { session_id });

        let task = tokio::spawn(self.clone().run_session(transport, rx, cancel, generation));
        if let Some(session) = self.inner.link.lock().session.as_mut() {
            if session.generation == generation {
                session.task = Some(task);
            }
        }
    }

    async fn run_session(
        self,
        mut transport: Box<dyn Transport>,
        mut rx: mpsc::Receiver<Outbound>,
        cancel: CancellationToken,
        generation: u64,
    ) {
        let interval = self.inner.config.keepalive_interval;
        let mut keepalive =
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let lost = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if let Err(e) = transport.disconnect().await {
                        tracing::debug!("close handshake failed: {}", e);
                    }
                    break None;
                }
                Some(outbound) = rx.recv() => {
                    let result = transport.send(outbound.frame).await;
                    let _ = outbound.done.send(result);
                    if !transport.is_connected() {
                        break Some("connection lost while sending".to_string());
                    }
                }
                _ = keepalive.tick() => {
                    if let Err(e) = transport.send(Frame::Ping).await {
                        tracing::warn!("keep-alive ping failed: {}", e);
                    }
                }
                received = transport.recv() => match received {
                    Ok(Some(frame)) => self.handle_frame(frame, transport.as_mut()).await,
                    Ok(None) => break Some("connection closed by relay".to_string()),
                    Err(TransportError::SerializationError(e)) => {
                        tracing::warn!("dropping malformed frame: {}", e);
                    }
                    Err(e) => break Some(e.to_string()),
                },
            }
        };

        let Some(reason) = lost else { return };

        let current = {
            let mut link = self.inner.link.lock();
            let current = link
                .session
                .as_ref()
                .is_some_and(|session| session.generation == generation);
            if current {
                link.session = None;
                link.outbound = None;
            }
            current
        };
        if !current {
            return;
        }

        tracing::warn!("relay connection lost: {}", reason);
        if self.record_failure(&reason) {
            self.spawn_reconnect();
        }
    }

    async fn handle_frame(&self, frame: Frame, transport: &mut dyn Transport) {
        match frame {
            Frame::Data {
                message_id,
                data_type,
                payload,
            } => {
                if let Err(e) = transport.send(Frame::ack(message_id.clone())).await {
                    tracing::warn!("failed to ack {}: {}", message_id, e);
                }
                tracing::debug!("received {} frame {}", data_type, message_id);
                // No subscribers is fine; the frame was still acknowledged.
                let _ = self.inner.incoming.send(IncomingData {
                    message_id,
                    data_type,
                    payload,
                });
            }
            Frame::Ack { message_id } => {
                if !self.inner.ledger.acknowledge(&message_id) {
                    tracing::debug!("ignoring ack for unknown message {}", message_id);
                }
            }
            Frame::Error {
                message_id: Some(message_id),
                message,
            } => {
                tracing::warn!("relay rejected {}: {}", message_id, message);
                self.inner.ledger.fail(&message_id, message, false);
            }
            Frame::Error {
                message_id: None,
                message,
            } => tracing::warn!("relay error: {}", message),
            Frame::Ping => {
                if let Err(e) = transport.send(Frame::Pong).await {
                    tracing::warn!("failed to answer ping: {}", e);
                }
            }
            Frame::Pong => tracing::debug!("keep-alive pong"),
        }
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
