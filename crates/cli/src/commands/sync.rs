// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `full` and `diff`: run one sync and print its events.

use std::io::Write;

use super::Context;
use crate::error::{Error, Result};
use crate::sync::{Session, SyncEvent, SyncEvents};

/// Pull every catalog.
pub async fn full(ctx: Context) -> Result<()> {
    let session = Session::open(&ctx.config, ctx.account, ctx.db)?;
    let events = session.update_all();
    let result = follow(events, &mut std::io::stdout()).await;
    session.close().await;
    result
}

/// Push unsent documents. Relay acknowledgments get a grace period before
/// the connection is closed.
pub async fn diff(ctx: Context) -> Result<()> {
    let session = Session::open(&ctx.config, ctx.account, ctx.db)?;
    let events = session.update_differential();
    let result = follow(events, &mut std::io::stdout()).await;
    let waiting = session.settle(ctx.config.delivery.send_timeout()).await;
    if waiting > 0 {
        tracing::warn!("{} documents still unacknowledged; they stay unsent", waiting);
    }
    session.close().await;
    result
}

/// Prints progress lines until the run ends. Ctrl-C cancels the run.
async fn follow(mut events: SyncEvents, out: &mut impl Write) -> Result<()> {
    let cancel = events.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    let result = print_events(&mut events, out).await;
    interrupt.abort();
    result
}

pub(crate) async fn print_events(events: &mut SyncEvents, out: &mut impl Write) -> Result<()> {
    while let Some(event) = events.next().await {
        match event {
            SyncEvent::Progress(line) => writeln!(out, "{}", line)?,
            SyncEvent::Success(_) => {
                writeln!(out, "done")?;
                return Ok(());
            }
            SyncEvent::Error(message) => return Err(Error::SyncFailed(message)),
        }
    }
    Err(Error::SyncFailed("sync ended without a result".to_string()))
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
