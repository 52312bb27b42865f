// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! fieldsync-relay: WebSocket relay server for fieldsync clients.

use clap::Parser;
use std::net::SocketAddr;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use fieldsync_relay::RelayState;

/// fieldsync-relay: relay server for field sync clients
#[derive(Parser, Debug)]
#[command(name = "fieldsync-relay")]
#[command(about = "WebSocket relay server for fieldsync clients")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:7890")]
    bind: SocketAddr,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting fieldsync-relay");
    info!("  Bind address: {}", args.bind);

    fieldsync_relay::run(args.bind, RelayState::new()).await
}
