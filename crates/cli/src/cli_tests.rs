// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use clap::CommandFactory;
use yare::parameterized;

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[parameterized(
    full = { &["fieldsync", "full"] },
    diff = { &["fieldsync", "diff"] },
    status = { &["fieldsync", "status"] },
    listen = { &["fieldsync", "listen"] },
)]
fn parses_bare_commands(args: &[&str]) {
    assert!(Cli::try_parse_from(args).is_ok());
}

#[test]
fn global_flags_follow_subcommand() {
    let cli = Cli::try_parse_from(["fieldsync", "full", "-v", "--config", "/tmp/f.toml"]).unwrap();
    assert!(cli.verbose);
    assert_eq!(cli.config, Some(PathBuf::from("/tmp/f.toml")));
    assert!(matches!(cli.command, Command::Full));
}

#[test]
fn listen_defaults() {
    let cli = Cli::try_parse_from(["fieldsync", "listen"]).unwrap();
    match cli.command {
        Command::Listen {
            duration_secs,
            retry_every,
        } => {
            assert_eq!(duration_secs, None);
            assert_eq!(retry_every, 30);
        }
        _ => panic!("expected listen"),
    }
}

#[test]
fn listen_with_duration() {
    let cli = Cli::try_parse_from(["fieldsync", "listen", "--duration", "5"]).unwrap();
    assert!(matches!(
        cli.command,
        Command::Listen {
            duration_secs: Some(5),
            ..
        }
    ));
}

#[test]
fn add_document_takes_three_arguments() {
    let cli =
        Cli::try_parse_from(["fieldsync", "add-document", "order", "o-1", "{\"sum\":1}"]).unwrap();
    match cli.command {
        Command::AddDocument {
            category,
            id,
            payload,
        } => {
            assert_eq!(category, "order");
            assert_eq!(id, "o-1");
            assert_eq!(payload, "{\"sum\":1}");
        }
        _ => panic!("expected add-document"),
    }
}

#[test]
fn add_document_missing_payload_fails() {
    assert!(Cli::try_parse_from(["fieldsync", "add-document", "order", "o-1"]).is_err());
}

#[test]
fn unknown_command_fails() {
    assert!(Cli::try_parse_from(["fieldsync", "push"]).is_err());
}
