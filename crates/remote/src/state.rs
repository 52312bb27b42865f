// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Relay state shared by every connection.
//!
//! Tracks connected clients and fans data frames out to everyone except
//! the sender.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use fieldsync_core::Frame;
use tokio::sync::broadcast;

const BROADCAST_CAPACITY: usize = 1024;

/// A data frame on its way to the other clients.
#[derive(Debug, Clone)]
pub struct Relayed {
    pub from: u64,
    pub frame: Frame,
}

/// Shared relay state. Cheap to clone.
#[derive(Clone)]
pub struct RelayState {
    inner: Arc<RelayStateInner>,
}

struct RelayStateInner {
    broadcast_tx: broadcast::Sender<Relayed>,
    next_client_id: AtomicU64,
    connected: AtomicUsize,
    relayed: AtomicU64,
    /// When false, data frames are swallowed without an ack.
    ack_data: AtomicBool,
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayState {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        RelayState {
            inner: Arc::new(RelayStateInner {
                broadcast_tx,
                next_client_id: AtomicU64::new(1),
                connected: AtomicUsize::new(0),
                relayed: AtomicU64::new(0),
                ack_data: AtomicBool::new(true),
            }),
        }
    }

    /// Registers a new connection. The client counts as connected until the
    /// returned handle is dropped.
    pub fn register(&self) -> ClientHandle {
        let id = self.inner.next_client_id.fetch_add(1, Ordering::Relaxed);
        self.inner.connected.fetch_add(1, Ordering::Relaxed);
        ClientHandle {
            id,
            rx: self.inner.broadcast_tx.subscribe(),
            state: self.clone(),
        }
    }

    /// Queues a data frame for every client other than `from`.
    pub fn publish(&self, from: u64, frame: Frame) {
        self.inner.relayed.fetch_add(1, Ordering::Relaxed);
        // No receivers just means nobody else is connected.
        let _ = self.inner.broadcast_tx.send(Relayed { from, frame });
    }

    pub fn connected_clients(&self) -> usize {
        self.inner.connected.load(Ordering::Relaxed)
    }

    /// Data frames accepted since startup.
    pub fn relayed_frames(&self) -> u64 {
        self.inner.relayed.load(Ordering::Relaxed)
    }

    pub fn acks_data(&self) -> bool {
        self.inner.ack_data.load(Ordering::Relaxed)
    }

    /// Stop (or resume) acknowledging data frames. Frames received while
    /// acks are off are dropped.
    pub fn set_ack_data(&self, ack: bool) {
        self.inner.ack_data.store(ack, Ordering::Relaxed);
    }
}

/// One registered connection.
pub struct ClientHandle {
    id: u64,
    rx: broadcast::Receiver<Relayed>,
    state: RelayState,
}

impl ClientHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next frame relayed from another client.
    pub async fn recv(&mut self) -> Result<Frame, broadcast::error::RecvError> {
        loop {
            let relayed = self.rx.recv().await?;
            if relayed.from != self.id {
                return Ok(relayed.frame);
            }
        }
    }
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        self.state.inner.connected.fetch_sub(1, Ordering::Relaxed);
    }
}
