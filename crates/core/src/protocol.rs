// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wire formats shared by the sync engine and the relay.
//!
//! Two channels exist:
//! - the relay, a WebSocket carrying JSON [`Frame`]s in both directions
//! - the HTTP server, answering catalog page, document push and token requests

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::account::AccountFlags;
use crate::error::{Error, Result};

/// A JSON frame exchanged over the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Application data; the receiver answers with an [`Frame::Ack`].
    Data {
        #[serde(rename = "messageId")]
        message_id: String,
        #[serde(rename = "dataType")]
        data_type: String,
        #[serde(default)]
        payload: Value,
    },

    /// Delivery confirmation for a data frame.
    Ack {
        #[serde(rename = "messageId")]
        message_id: String,
    },

    /// Keep-alive request; answered with `Pong`.
    Ping,

    /// Keep-alive answer.
    Pong,

    /// Peer-side rejection, optionally tied to a data frame.
    Error {
        #[serde(
            rename = "messageId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        message_id: Option<String>,
        #[serde(default)]
        message: String,
    },
}

impl Frame {
    pub fn data(
        message_id: impl Into<String>,
        data_type: impl Into<String>,
        payload: Value,
    ) -> Self {
        Frame::Data {
            message_id: message_id.into(),
            data_type: data_type.into(),
            payload,
        }
    }

    pub fn ack(message_id: impl Into<String>) -> Self {
        Frame::Ack {
            message_id: message_id.into(),
        }
    }

    pub fn error(message_id: Option<String>, message: impl Into<String>) -> Self {
        Frame::Error {
            message_id,
            message: message.into(),
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Opaque numeric continuation token for catalog paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogCursor(u64);

impl CatalogCursor {
    pub fn new(value: u64) -> Self {
        CatalogCursor(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Reads the server's `more` field: a number or numeric string.
    /// Null, missing and empty strings mean there are no further pages.
    pub fn from_value(value: Option<&Value>) -> Result<Option<Self>> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map(|n| Some(CatalogCursor(n)))
                .map_err(|_| Error::InvalidCursor(s.clone())),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(|n| Some(CatalogCursor(n)))
                .ok_or_else(|| Error::InvalidCursor(n.to_string())),
            Some(other) => Err(Error::InvalidCursor(other.to_string())),
        }
    }
}

impl fmt::Display for CatalogCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One page of a catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResponse {
    pub data: Vec<Value>,
    pub more: Option<CatalogCursor>,
}

impl PageResponse {
    /// Parses a page body. A body that is not an object with an array `data`
    /// (or no `data` at all) is rejected.
    pub fn from_json(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s)?;
        let object = value
            .as_object()
            .ok_or_else(|| Error::CorruptedData("page is not a JSON object".into()))?;
        let data = match object.get("data") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => return Err(Error::CorruptedData("page data is not an array".into())),
        };
        let more = CatalogCursor::from_value(object.get("more"))?;
        Ok(PageResponse { data, more })
    }
}

/// Outcome class of a document push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushResult {
    Ok,
    Error,
    Unknown(String),
}

/// Server answer to a document push.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushResponse {
    #[serde(default)]
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PushResponse {
    pub fn outcome(&self) -> PushResult {
        match self.result.to_lowercase().as_str() {
            "ok" => PushResult::Ok,
            "error" => PushResult::Error,
            other => PushResult::Unknown(other.to_string()),
        }
    }
}

/// Credentials sent to obtain a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRequest {
    pub login: String,
    pub secret: String,
}

/// Server answer to a token request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub token: String,
    #[serde(default)]
    pub flags: AccountFlags,
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
