// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod document;
pub mod listen;
pub mod status;
pub mod sync;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fieldsync_core::{Account, Database};

use crate::config::{default_config_path, Config};
use crate::error::Result;

/// Everything a command needs: the parsed config, the local store and the
/// configured account.
pub struct Context {
    pub config: Config,
    pub db: Arc<Database>,
    pub account: Account,
}

/// Helper to open the database and account from the config file.
pub fn open_context(config_path: Option<&Path>) -> Result<Context> {
    let path: PathBuf = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);
    let config = Config::load(&path)?;
    let account = config.account()?;
    tracing::debug!("opening store at {}", config.database.display());
    let db = Arc::new(Database::open(&config.database)?);
    Ok(Context {
        config,
        db,
        account,
    })
}
