// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Documents captured in the field and pushed back to the server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Kind of locally created document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Order,
    CashReceipt,
    ClientImage,
    ClientLocation,
}

impl DocumentCategory {
    /// Categories in the order a differential sync pushes them.
    pub const ALL: [DocumentCategory; 4] = [
        DocumentCategory::Order,
        DocumentCategory::CashReceipt,
        DocumentCategory::ClientImage,
        DocumentCategory::ClientLocation,
    ];

    /// Returns the string representation used in storage and as relay data type.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentCategory::Order => "order",
            DocumentCategory::CashReceipt => "cash_receipt",
            DocumentCategory::ClientImage => "client_image",
            DocumentCategory::ClientLocation => "client_location",
        }
    }

    /// HTTP path segment the category is pushed to.
    pub fn endpoint(&self) -> &'static str {
        match self {
            DocumentCategory::Order => "orders",
            DocumentCategory::CashReceipt => "cash_receipts",
            DocumentCategory::ClientImage => "client_images",
            DocumentCategory::ClientLocation => "client_locations",
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DocumentCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "order" | "orders" => Ok(DocumentCategory::Order),
            "cash_receipt" | "cash_receipts" => Ok(DocumentCategory::CashReceipt),
            "client_image" | "client_images" => Ok(DocumentCategory::ClientImage),
            "client_location" | "client_locations" => Ok(DocumentCategory::ClientLocation),
            _ => Err(Error::UnknownCategory(s.to_string())),
        }
    }
}

/// Whether a document has reached the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Unsent,
    Sent,
}

impl SendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendStatus::Unsent => "unsent",
            SendStatus::Sent => "sent",
        }
    }
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SendStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "unsent" => Ok(SendStatus::Unsent),
            "sent" => Ok(SendStatus::Sent),
            _ => Err(Error::InvalidSendStatus(s.to_string())),
        }
    }
}

/// A locally created document awaiting (or past) delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub category: DocumentCategory,
    pub id: String,
    pub payload: Value,
    pub status: SendStatus,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(category: DocumentCategory, id: impl Into<String>, payload: Value) -> Self {
        Document {
            category,
            id: id.into(),
            payload,
            status: SendStatus::Unsent,
            created_at: Utc::now(),
        }
    }

    /// Body pushed to the server for this document.
    pub fn to_wire(&self) -> Value {
        json!({
            "id": self.id,
            "category": self.category.as_str(),
            "created_at": self.created_at.to_rfc3339(),
            "data": self.payload,
        })
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
