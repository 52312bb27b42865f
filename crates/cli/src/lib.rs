// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! fieldsync - offline-first catalog and document sync for field sales.
//!
//! This crate provides the sync engine behind the `fieldsync` CLI: catalogs
//! are pulled page by page over HTTP into a local SQLite store, and documents
//! written offline are pushed back over HTTP or a WebSocket relay once the
//! agent is online again.
//!
//! # Main Components
//!
//! - [`Session`](sync::Session) - one account's connection, sender and ingestor
//! - [`ConnectionManager`](sync::ConnectionManager) - relay connection with
//!   reconnect and keep-alive
//! - [`MessageSender`](sync::MessageSender) - at-least-once relay delivery
//! - [`Ingestor`](sync::Ingestor) - validation and idempotent upsert
//! - [`Config`] - TOML configuration
//! - [`Error`] - Error types for all operations
//!
//! # Running a sync
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fieldsync::{sync::Session, Config};
//! use fieldsync_core::Database;
//!
//! let config = Config::load(&path)?;
//! let db = Arc::new(Database::open(&config.database)?);
//! let session = Session::open(&config, config.account()?, db)?;
//! let mut events = session.update_all();
//! while let Some(event) = events.next().await {
//!     println!("{}", event.label());
//! }
//! ```

mod cli;
mod commands;

pub mod config;
pub mod error;
pub mod logging;
pub mod sync;

pub use cli::{Cli, Command};
pub use config::Config;
pub use error::{Error, Result};

use std::time::Duration;

/// Execute a CLI command. This is the main entry point for library users
/// and provides a testable way to run commands without process execution.
pub async fn run(cli: Cli) -> Result<()> {
    let ctx = commands::open_context(cli.config.as_deref())?;
    match cli.command {
        Command::Full => commands::sync::full(ctx).await,
        Command::Diff => commands::sync::diff(ctx).await,
        Command::Listen {
            duration_secs,
            retry_every,
        } => {
            commands::listen::run(
                ctx,
                duration_secs.map(Duration::from_secs),
                Duration::from_secs(retry_every),
            )
            .await
        }
        Command::Status => commands::status::run(ctx),
        Command::AddDocument {
            category,
            id,
            payload,
        } => commands::document::run(ctx, &category, &id, &payload),
    }
}
