// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration file management.
//!
//! Configuration is stored in `$XDG_CONFIG_HOME/fieldsync/config.toml` and includes:
//! - `database`: path of the local SQLite store
//! - `[connection]`: relay backoff, keep-alive and timeouts
//! - `[delivery]`: pending-message retry ceiling and expiry
//! - `[http]`: request timeout for the HTTP server
//! - `[account]`: the account being synced

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fieldsync_core::{Account, AccountFlags};

use crate::error::{Error, Result};
use crate::sync::ConnectionConfig;

const APP_DIR_NAME: &str = "fieldsync";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "fieldsync.db";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Path of the SQLite store.
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default)]
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub delivery: DeliverySettings,
    #[serde(default)]
    pub http: HttpSettings,
    /// The account to sync. Required by every command that talks to a server.
    pub account: Option<AccountSettings>,
}

/// Relay connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSettings {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Largest exponent applied to the base delay.
    #[serde(default = "default_max_backoff_shift")]
    pub max_backoff_shift: u32,
    /// Consecutive failed attempts before giving up (0 = unlimited).
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Wait after connecting before the first document is pushed.
    #[serde(default = "default_stabilization_ms")]
    pub stabilization_ms: u64,
}

/// Settings for messages awaiting acknowledgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeliverySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_message_ttl_secs")]
    pub message_ttl_secs: u64,
    /// A send not written within this window reports `Pending`.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpSettings {
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

/// Account section of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountSettings {
    pub id: String,
    pub server_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_url: Option<String>,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<AccountFlags>,
}

fn default_database() -> PathBuf {
    state_dir().join(DB_FILE_NAME)
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_max_backoff_shift() -> u32 {
    6
}

fn default_keepalive_interval_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_stabilization_ms() -> u64 {
    500
}

fn default_max_retries() -> u32 {
    3
}

fn default_message_ttl_secs() -> u64 {
    300
}

fn default_send_timeout_ms() -> u64 {
    5_000
}

fn default_http_timeout_secs() -> u64 {
    30
}

/// Directory holding the default database.
pub fn state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectionSettings {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_backoff_shift: default_max_backoff_shift(),
            max_reconnect_attempts: 0,
            keepalive_interval_ms: default_keepalive_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            stabilization_ms: default_stabilization_ms(),
        }
    }
}

impl ConnectionSettings {
    pub fn to_connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_backoff_shift: self.max_backoff_shift,
            max_reconnect_attempts: self.max_reconnect_attempts,
            keepalive_interval: Duration::from_millis(self.keepalive_interval_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }

    pub fn stabilization(&self) -> Duration {
        Duration::from_millis(self.stabilization_ms)
    }
}

impl Default for DeliverySettings {
    fn default() -> Self {
        DeliverySettings {
            max_retries: default_max_retries(),
            message_ttl_secs: default_message_ttl_secs(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl DeliverySettings {
    pub fn message_ttl(&self) -> Duration {
        Duration::from_secs(self.message_ttl_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AccountSettings {
    pub fn to_account(&self) -> Account {
        Account {
            id: self.id.clone(),
            server_url: self.server_url.clone(),
            relay_url: self.relay_url.clone(),
            login: self.login.clone(),
            secret: self.secret.clone(),
            token: self.token.clone(),
            flags: self.flags,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: default_database(),
            connection: ConnectionSettings::default(),
            delivery: DeliverySettings::default(),
            http: HttpSettings::default(),
            account: None,
        }
    }
}

impl Config {
    /// Loads configuration from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;
        Self::parse(&content)
    }

    /// Parses and validates configuration text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.connection.base_delay_ms == 0 {
            return Err(Error::Config("connection.base_delay_ms must be positive".into()));
        }
        if self.connection.max_delay_ms < self.connection.base_delay_ms {
            return Err(Error::Config(
                "connection.max_delay_ms must not be smaller than base_delay_ms".into(),
            ));
        }
        if let Some(settings) = &self.account {
            let account = settings.to_account();
            account.validate_http()?;
            if let Some(url) = &account.relay_url {
                if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                    return Err(Error::Config(format!(
                        "invalid relay url '{}': must be ws:// or wss://",
                        url
                    )));
                }
            }
        }
        Ok(())
    }

    /// The configured account, or an error naming the missing section.
    pub fn account(&self) -> Result<Account> {
        self.account
            .as_ref()
            .map(AccountSettings::to_account)
            .ok_or_else(|| Error::Config("no [account] section in config".into()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
