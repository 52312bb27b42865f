// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Applying server records to the local store.
//!
//! A batch may mix record types. Records are grouped by their `type` field in
//! first-seen order, each group is built and validated, and the valid rows
//! are upserted together. A record that fails to build is logged with its
//! natural key and dropped; a group that fails to store is logged, flagged in
//! the report, and the remaining groups still run. Nothing here is raised to the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use fieldsync_core::catalog::raw_key;
use fieldsync_core::{
    build_record, CatalogRecord, DocumentCategory, LocalStore, RecordKind, SendStatus,
    StoredRecord,
};
use serde_json::{json, Value};

/// Records received per type name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCounters(BTreeMap<String, usize>);

impl SyncCounters {
    pub fn add(&mut self, type_name: &str, count: usize) {
        *self.0.entry(type_name.to_string()).or_default() += count;
    }

    pub fn get(&self, type_name: &str) -> usize {
        self.0.get(type_name).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn merge(&mut self, other: &SyncCounters) {
        for (name, count) in &other.0 {
            self.add(name, *count);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SyncCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(name, count)| format!("{}: {}", name, count))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// What happened to one ingested batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Records in the batch.
    pub received: usize,
    /// Rows written, derived rows included.
    pub stored: usize,
    /// Records dropped as unknown, invalid or unstorable.
    pub rejected: usize,
    /// A group was valid but the store refused it, so its rows kept their
    /// old sync time.
    pub store_failed: bool,
    pub counters: SyncCounters,
}

impl IngestReport {
    pub fn merge(&mut self, other: &IngestReport) {
        self.received += other.received;
        self.stored += other.stored;
        self.rejected += other.rejected;
        self.store_failed |= other.store_failed;
        self.counters.merge(&other.counters);
    }
}

/// Writes server records and delivery results to the local store.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn LocalStore>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Ingestor { store }
    }

    /// Builds, validates and upserts a mixed batch, stamping every row with `synced_at`.
    pub fn ingest(&self, account_id: &str, batch: &[Value], synced_at: i64) -> IngestReport {
        let mut report = IngestReport {
            received: batch.len(),
            ..IngestReport::default()
        };

        for (type_name, records) in group_by_type(batch) {
            if type_name.is_empty() {
                tracing::warn!("skipping {} records without a type", records.len());
                report.rejected += records.len();
                continue;
            }
            report.counters.add(&type_name, records.len());
            let kind: RecordKind = match type_name.parse() {
                Ok(kind) => kind,
                Err(e) => {
                    tracing::warn!("skipping {} records: {}", records.len(), e);
                    report.rejected += records.len();
                    continue;
                }
            };

            let (rows, built) = build_rows(kind, &records, synced_at, &mut report.rejected);
            let mut pending = vec![(kind, rows)];
            if kind == RecordKind::Price {
                pending.push((RecordKind::PriceType, price_type_rows(&built, synced_at)));
            }

            for (kind, rows) in pending {
                if rows.is_empty() {
                    continue;
                }
                match self.store.upsert(account_id, &rows) {
                    Ok(outcome) => {
                        tracing::debug!(
                            "{}: {} inserted, {} updated",
                            kind,
                            outcome.inserted,
                            outcome.updated
                        );
                        report.stored += outcome.total();
                    }
                    Err(e) => {
                        tracing::warn!("failed to store {} {} records: {}", rows.len(), kind, e);
                        report.store_failed = true;
                        if kind != RecordKind::PriceType {
                            report.rejected += rows.len();
                        }
                    }
                }
            }
        }
        report
    }

    /// Deletes every row of the account last synced before `cutoff`.
    pub fn clean_up(&self, account_id: &str, cutoff: i64) -> usize {
        let mut deleted = 0;
        for kind in RecordKind::ALL {
            match self.store.delete_older_than(account_id, kind, cutoff) {
                Ok(0) => {}
                Ok(n) => {
                    tracing::info!("pruned {} stale {} records", n, kind);
                    deleted += n;
                }
                Err(e) => tracing::warn!("failed to prune {} records: {}", kind, e),
            }
        }
        deleted
    }

    /// Records that the server accepted a document.
    pub fn mark_sent(&self, account_id: &str, category: DocumentCategory, id: &str) -> bool {
        match self
            .store
            .mark_sent(account_id, category, id, SendStatus::Sent)
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("failed to mark {} {} as sent: {}", category, id, e);
                false
            }
        }
    }
}

/// Groups records by their `type` field, keeping first-seen group order and
/// record order within each group. Records without a type land under "".
fn group_by_type(batch: &[Value]) -> Vec<(String, Vec<&Value>)> {
    let mut groups: Vec<(String, Vec<&Value>)> = Vec::new();
    for record in batch {
        let type_name = record
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        match groups.iter_mut().find(|(name, _)| name == type_name) {
            Some((_, records)) => records.push(record),
            None => groups.push((type_name.to_string(), vec![record])),
        }
    }
    groups
}

fn build_rows(
    kind: RecordKind,
    records: &[&Value],
    synced_at: i64,
    rejected: &mut usize,
) -> (Vec<StoredRecord>, Vec<CatalogRecord>) {
    let mut rows = Vec::with_capacity(records.len());
    let mut built = Vec::with_capacity(records.len());
    for raw in records {
        let result = build_record(kind, raw)
            .and_then(|record| record.to_payload().map(|payload| (record, payload)));
        match result {
            Ok((record, payload)) => {
                rows.push(StoredRecord {
                    kind,
                    key: record.natural_key(),
                    payload,
                    synced_at,
                });
                built.push(record);
            }
            Err(e) => {
                tracing::warn!("dropping {} '{}': {}", kind, raw_key(kind, raw), e);
                *rejected += 1;
            }
        }
    }
    (rows, built)
}

/// One price-type row per distinct code, labelled from the first price carrying it.
fn price_type_rows(prices: &[CatalogRecord], synced_at: i64) -> Vec<StoredRecord> {
    let mut labels: Vec<(String, String)> = Vec::new();
    for record in prices {
        let CatalogRecord::Price(price) = record else {
            continue;
        };
        if labels.iter().any(|(code, _)| *code == price.price_type) {
            continue;
        }
        let label = price
            .price_type_name
            .clone()
            .unwrap_or_else(|| price.price_type.clone());
        labels.push((price.price_type.clone(), label));
    }

    labels
        .into_iter()
        .filter_map(|(code, label)| {
            let raw = json!({"code": code, "description": label});
            let record = build_record(RecordKind::PriceType, &raw).ok()?;
            let payload = record.to_payload().ok()?;
            Some(StoredRecord {
                kind: RecordKind::PriceType,
                key: record.natural_key(),
                payload,
                synced_at,
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
