// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use fieldsync_core::{Database, Document, DocumentCategory};
use serde_json::Value;

use super::Context;
use crate::error::{Error, Result};

pub fn run(ctx: Context, category: &str, id: &str, payload: &str) -> Result<()> {
    let document = add(&ctx.db, &ctx.account.id, category, id, payload)?;
    println!(
        "Queued {} {} for the next differential sync",
        document.category, document.id
    );
    Ok(())
}

/// Validates the arguments and stores the document as unsent.
pub(crate) fn add(
    db: &Database,
    account_id: &str,
    category: &str,
    id: &str,
    payload: &str,
) -> Result<Document> {
    let category: DocumentCategory = category.parse()?;
    let id = id.trim();
    if id.is_empty() {
        return Err(Error::FieldRequired {
            field: "Document id",
        });
    }
    let payload: Value = serde_json::from_str(payload)?;
    let document = Document::new(category, id, payload);
    db.add_document(account_id, &document)?;
    tracing::info!("queued {} {}", category, id);
    Ok(document)
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
