// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for fieldsync-core operations.

use thiserror::Error;

/// All possible errors that can occur in fieldsync-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {kind} record '{key}': {reason}")]
    InvalidRecord {
        kind: String,
        key: String,
        reason: String,
    },

    #[error("unknown record type: '{0}'\n  hint: valid types are: client, debt, good, price, price_type, payment_type, company, store, rest, client_location, client_direction, client_product, image")]
    UnknownRecordKind(String),

    #[error("unknown catalog: '{0}'\n  hint: valid catalogs are: clients, debts, goods, payment_types, companies, stores, rests, client_locations, client_directions, client_products, images")]
    UnknownCatalog(String),

    #[error("unknown document category: '{0}'\n  hint: valid categories are: order, cash_receipt, client_image, client_location")]
    UnknownCategory(String),

    #[error("invalid send status: '{0}'\n  hint: valid statuses are: unsent, sent")]
    InvalidSendStatus(String),

    #[error("invalid account: {0}")]
    InvalidAccount(String),

    #[error("invalid page cursor: '{0}'")]
    InvalidCursor(String),

    #[error("document not found: {category} {id}")]
    DocumentNotFound { category: String, id: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

/// A specialized Result type for fieldsync-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
