// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::sync::{ApiError, TransportError};

/// All possible errors that can occur in the fieldsync library.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("config file not found: {0}\n  hint: pass --config or create the file")]
    ConfigNotFound(String),

    #[error(transparent)]
    Core(#[from] fieldsync_core::Error),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("server error: {0}")]
    Api(#[from] ApiError),

    #[error("not connected to relay")]
    NotConnected,

    #[error("authentication failed: {0}\n  hint: check the account login and secret")]
    Authentication(String),

    #[error("account '{0}' is not allowed to send documents")]
    WriteNotAllowed(String),

    #[error("sync cancelled")]
    Cancelled,

    #[error("{field} is required")]
    FieldRequired { field: &'static str },

    #[error("sync failed: {0}")]
    SyncFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether trying the same operation again later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) | Error::NotConnected => true,
            Error::Api(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// A specialized Result type for fieldsync operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
