// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Accounts and the server-granted capability flags that shape a sync run.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Capabilities granted to an account by the server alongside its token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountFlags {
    /// The account may push documents back to the server.
    pub write_allowed: bool,
    /// Documents travel over the relay instead of plain HTTP.
    pub relay_enabled: bool,
    pub load_companies: bool,
    pub use_stores: bool,
    pub load_rests: bool,
    pub load_client_locations: bool,
    pub load_client_directions: bool,
    pub load_client_products: bool,
    pub load_images: bool,
}

/// The channel used to push documents during a differential run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Http,
    Relay,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Http => "http",
            TransportKind::Relay => "relay",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A field-sales account: where to sync from and how to authenticate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub server_url: String,
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub flags: Option<AccountFlags>,
}

impl Account {
    pub fn new(id: impl Into<String>, server_url: impl Into<String>) -> Self {
        Account {
            id: id.into(),
            server_url: server_url.into(),
            relay_url: None,
            login: String::new(),
            secret: String::new(),
            token: None,
            flags: None,
        }
    }

    pub fn with_relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay_url = Some(url.into());
        self
    }

    pub fn with_credentials(mut self, login: impl Into<String>, secret: impl Into<String>) -> Self {
        self.login = login.into();
        self.secret = secret.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_flags(mut self, flags: AccountFlags) -> Self {
        self.flags = Some(flags);
        self
    }

    /// True when a token request must precede any server call.
    pub fn needs_token(&self) -> bool {
        self.access_token().is_none() || self.flags.is_none()
    }

    /// The current token, ignoring empty strings.
    pub fn access_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    /// Flags granted by the server, or all-off when none were granted yet.
    pub fn flags(&self) -> AccountFlags {
        self.flags.unwrap_or_default()
    }

    pub fn can_write(&self) -> bool {
        self.flags().write_allowed
    }

    /// Chooses the push channel for this account.
    pub fn transport(&self) -> TransportKind {
        if self.flags().relay_enabled && self.relay_url.is_some() {
            TransportKind::Relay
        } else {
            TransportKind::Http
        }
    }

    /// Checks that the account can talk to its HTTP server.
    pub fn validate_http(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidAccount("account id is empty".into()));
        }
        if !has_scheme(&self.server_url, &["http://", "https://"]) {
            return Err(Error::InvalidAccount(format!(
                "server url must start with http:// or https://, got '{}'",
                self.server_url
            )));
        }
        Ok(())
    }

    /// Builds the relay endpoint, with the access token appended as a query parameter.
    pub fn relay_endpoint(&self) -> Result<String> {
        let url = self
            .relay_url
            .as_deref()
            .ok_or_else(|| Error::InvalidAccount("relay url is not configured".into()))?;
        if !has_scheme(url, &["ws://", "wss://"]) {
            return Err(Error::InvalidAccount(format!(
                "relay url must start with ws:// or wss://, got '{url}'"
            )));
        }
        let token = self
            .access_token()
            .ok_or_else(|| Error::InvalidAccount("no access token for relay".into()))?;
        let separator = if url.contains('?') { '&' } else { '?' };
        Ok(format!("{url}{separator}token={token}"))
    }
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    schemes
        .iter()
        .any(|scheme| url.len() > scheme.len() && url.starts_with(scheme))
}

#[cfg(test)]
#[path = "account_tests.rs"]
mod tests;
