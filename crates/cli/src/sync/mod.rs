// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The field-sales sync engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   pages    ┌─────────────┐
//! │ Orchestrator │──────────►│  RemoteApi  │──── HTTP server
//! │ (SyncEvents) │  pushes    │  (HttpApi)  │
//! └──────┬───────┘            └─────────────┘
//!        │ documents
//!        ▼
//! ┌──────────────┐  frames    ┌─────────────┐
//! │MessageSender │──────────►│ Connection  │──── relay
//! │   (ledger)   │◄──────────│  Manager    │
//! └──────────────┘   acks     └─────────────┘
//!        │                           │ pushed records
//!        ▼                           ▼
//! ┌──────────────────────────────────────────┐
//! │        Ingestor  →  LocalStore           │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Features
//!
//! - Paginated catalog pulls with staleness pruning
//! - Document pushes over HTTP or the relay, selected per account
//! - At-least-once relay delivery tracked in a pending ledger
//! - Automatic reconnect with capped exponential backoff and keep-alive
//! - Injectable transport and server API for testing

mod api;
mod connection;
mod delivery;
mod ingest;
mod ledger;
mod orchestrator;
mod session;
mod transport;

pub use api::{ApiError, ApiFuture, ApiResult, HttpApi, RemoteApi};
pub use connection::{
    ConnectionConfig, ConnectionManager, ConnectionState, IncomingData, TransportFactory,
};
pub use delivery::MessageSender;
pub use ingest::{IngestReport, Ingestor, SyncCounters};
pub use ledger::{PendingLedger, PendingMessage, SendResult, SendResults};
pub use orchestrator::{SyncEvent, SyncEvents};
pub use session::{Session, SessionOptions};
pub use transport::{
    Transport, TransportError, TransportFuture, TransportResult, WebSocketTransport,
};

#[cfg(test)]
pub(crate) mod test_helpers;
