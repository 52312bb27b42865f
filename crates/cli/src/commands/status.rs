// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local sync status: checkpoints, queued documents and stored catalogs.

use std::fmt;

use chrono::{DateTime, Utc};
use fieldsync_core::{
    Account, Database, DocumentCategory, RecordKind, SyncCheckpoint, TransportKind,
};

use super::Context;
use crate::error::Result;

pub struct StatusReport {
    pub account_id: String,
    pub transport: TransportKind,
    pub relay_url: Option<String>,
    pub checkpoint: SyncCheckpoint,
    pub unsent: Vec<(DocumentCategory, usize)>,
    pub records: Vec<(RecordKind, usize)>,
}

pub fn run(ctx: Context) -> Result<()> {
    let report = collect(&ctx.db, &ctx.account)?;
    print!("{}", report);
    Ok(())
}

pub(crate) fn collect(db: &Database, account: &Account) -> Result<StatusReport> {
    let checkpoint = db.checkpoint(&account.id)?;
    let unsent = DocumentCategory::ALL
        .into_iter()
        .map(|category| -> Result<_> { Ok((category, db.count_unsent(&account.id, category)?)) })
        .collect::<Result<Vec<_>>>()?;
    let records = RecordKind::ALL
        .into_iter()
        .map(|kind| -> Result<_> { Ok((kind, db.count_records(&account.id, kind)?)) })
        .collect::<Result<Vec<_>>>()?;

    Ok(StatusReport {
        account_id: account.id.clone(),
        transport: account.transport(),
        relay_url: account.relay_url.clone(),
        checkpoint,
        unsent,
        records,
    })
}

impl StatusReport {
    pub fn total_unsent(&self) -> usize {
        self.unsent.iter().map(|(_, n)| n).sum()
    }
}

fn format_time(at: Option<i64>) -> String {
    match at.and_then(DateTime::<Utc>::from_timestamp_millis) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "never".to_string(),
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Account: {}", self.account_id)?;
        writeln!(f, "Transport: {}", self.transport)?;
        if let Some(url) = &self.relay_url {
            writeln!(f, "Relay: {}", url)?;
        }
        writeln!(f, "Last full sync: {}", format_time(self.checkpoint.full_sync_at))?;
        writeln!(
            f,
            "Last differential sync: {}",
            format_time(self.checkpoint.differential_sync_at)
        )?;

        writeln!(f)?;
        writeln!(f, "Unsent documents: {}", self.total_unsent())?;
        for (category, count) in self.unsent.iter().filter(|(_, n)| *n > 0) {
            writeln!(f, "  {}: {}", category, count)?;
        }

        writeln!(f)?;
        writeln!(f, "Stored records:")?;
        let stored: Vec<_> = self.records.iter().filter(|(_, n)| *n > 0).collect();
        if stored.is_empty() {
            writeln!(f, "  none (run 'fieldsync full')")?;
        }
        for (kind, count) in stored {
            writeln!(f, "  {}: {}", kind, count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
