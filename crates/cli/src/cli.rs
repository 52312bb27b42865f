// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

// Custom help template that groups commands into sections
const HELP_TEMPLATE: &str = "{about-with-newline}
{usage-heading} {usage}

{before-help}Options:
{options}{after-help}";

const COMMANDS_HELP: &str = "\
Sync:
  full          Pull every catalog from the server
  diff          Push unsent documents
  listen        Stay connected to the relay and apply pushed records

Local Store:
  status        Show checkpoints, unsent documents and relay state
  add-document  Queue a document for the next differential sync";

const QUICKSTART_HELP: &str = "\
Get started:
  fieldsync full                              Pull catalogs
  fieldsync add-document order o-1 '{}'       Queue an order
  fieldsync diff                              Push it
  fieldsync status                            Check what is left";

#[derive(Parser)]
#[command(name = "fieldsync")]
#[command(about = "Offline-first catalog and document sync for field sales agents")]
#[command(
    long_about = "Offline-first catalog and document sync for field sales agents.\n\n\
    Pulls catalogs over HTTP and pushes documents over HTTP or a WebSocket relay."
)]
#[command(help_template = HELP_TEMPLATE)]
#[command(before_help = COMMANDS_HELP)]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Pull every catalog the account is entitled to
    Full,

    /// Push documents not yet accepted by the server
    Diff,

    /// Stay connected to the relay, applying pushed records
    #[command(after_help = "Examples:\n  \
        fieldsync listen                  Listen until interrupted\n  \
        fieldsync listen --duration 60    Listen for one minute")]
    Listen {
        /// Stop after this many seconds
        #[arg(long = "duration", value_name = "SECS")]
        duration_secs: Option<u64>,

        /// Seconds between retries of unacknowledged messages
        #[arg(long, value_name = "SECS", default_value_t = 30)]
        retry_every: u64,
    },

    /// Show sync checkpoints and unsent document counts
    Status,

    /// Queue a document for the next differential sync
    #[command(
        arg_required_else_help = true,
        after_help = "Examples:\n  \
        fieldsync add-document order o-1 '{\"client\":\"c-1\",\"lines\":[]}'\n  \
        fieldsync add-document cash_receipt r-7 '{\"amount\":120.5}'"
    )]
    AddDocument {
        /// Category (order, cash_receipt, client_image, client_location)
        category: String,

        /// Document identifier, unique within its category
        id: String,

        /// Document body as JSON
        payload: String,
    },
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
