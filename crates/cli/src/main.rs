// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use clap::Parser;
use fieldsync::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    fieldsync::logging::init(cli.verbose);
    if let Err(e) = fieldsync::run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
