// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! fieldsync-core: shared types for the fieldsync engine
//!
//! This crate provides accounts, catalog records, field documents, the relay
//! and HTTP wire formats, and the local SQLite store used by both the sync
//! engine and the relay.

pub mod account;
pub mod catalog;
pub mod document;
pub mod error;
pub mod protocol;
pub mod store;

pub use account::{Account, AccountFlags, TransportKind};
pub use catalog::{build_record, CatalogKind, CatalogRecord, RecordKind};
pub use document::{Document, DocumentCategory, SendStatus};
pub use error::{Error, Result};
pub use protocol::{
    CatalogCursor, Frame, PageResponse, PushResponse, PushResult, TokenGrant, TokenRequest,
};
pub use store::{
    CheckpointKind, Database, LocalStore, StoredRecord, SyncCheckpoint, UpsertOutcome,
};
