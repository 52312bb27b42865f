// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `listen`: hold the relay connection open and apply pushed records.
//!
//! An unreachable relay is not fatal; the connection keeps retrying in the
//! background and state changes are printed as they happen.

use std::time::Duration;

use tokio::time::MissedTickBehavior;

use super::Context;
use crate::error::Result;
use crate::sync::{ConnectionState, Session};

pub async fn run(ctx: Context, duration: Option<Duration>, retry_every: Duration) -> Result<()> {
    let session = Session::open(&ctx.config, ctx.account, ctx.db)?;
    if let Err(e) = session.connect().await {
        let gave_up = matches!(
            session.connection().state(),
            ConnectionState::Error { can_retry: false, .. }
        );
        if !e.is_retryable() || gave_up {
            session.close().await;
            return Err(e);
        }
        tracing::warn!("relay not reachable yet: {}", e);
    }
    println!("Listening on {}", session.connection().state().status_string());

    let result = listen(&session, duration, retry_every).await;
    session.close().await;
    result
}

async fn listen(session: &Session, duration: Option<Duration>, retry_every: Duration) -> Result<()> {
    let mut state = session.connection().watch_state();
    let mut retry = tokio::time::interval(retry_every.max(Duration::from_secs(1)));
    retry.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = state.borrow_and_update().status_string();
                println!("Relay: {}", current);
            }
            _ = retry.tick() => {
                let expired = session.sender().purge_expired();
                let retried = session.sender().retry_failed_messages().await;
                if expired + retried > 0 {
                    tracing::info!("retried {} messages, dropped {} expired", retried, expired);
                }
            }
        }
    }
    Ok(())
}
