// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP side of the server: tokens, catalog pages and document pushes.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use fieldsync_core::{
    Account, CatalogCursor, CatalogKind, DocumentCategory, PageResponse, PushResponse, TokenGrant,
    TokenRequest,
};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

/// Error type for server API calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Request(String),

    /// The server refused the credentials or token.
    #[error("unauthorized (status {0})")]
    Unauthorized(u16),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),

    #[error("no access token")]
    MissingToken,
}

impl ApiError {
    /// Network failures and server-side errors may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Request(_) => true,
            ApiError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Boxed future returned by [`RemoteApi`] methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = ApiResult<T>> + Send + 'a>>;

/// Server operations used by the sync orchestrator.
pub trait RemoteApi: Send + Sync {
    /// Exchange the account's credentials for a token and capability flags.
    fn request_token<'a>(&'a self, account: &'a Account) -> ApiFuture<'a, TokenGrant>;

    /// Fetch one page of a catalog, continuing from `cursor` when given.
    fn fetch_page<'a>(
        &'a self,
        account: &'a Account,
        catalog: CatalogKind,
        cursor: Option<CatalogCursor>,
    ) -> ApiFuture<'a, PageResponse>;

    /// Push one serialized document.
    fn push_document<'a>(
        &'a self,
        account: &'a Account,
        category: DocumentCategory,
        body: Value,
    ) -> ApiFuture<'a, PushResponse>;
}

/// [`RemoteApi`] over HTTP using reqwest.
pub struct HttpApi {
    client: Client,
}

impl HttpApi {
    pub fn new(timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;
        Ok(HttpApi { client })
    }

    fn endpoint(account: &Account, path: &str) -> String {
        format!("{}/{}", account.server_url.trim_end_matches('/'), path)
    }

    fn token(account: &Account) -> ApiResult<String> {
        account
            .access_token()
            .map(str::to_string)
            .ok_or(ApiError::MissingToken)
    }

    async fn read_body(response: Response) -> ApiResult<String> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized(status.as_u16()));
        }
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

impl RemoteApi for HttpApi {
    fn request_token<'a>(&'a self, account: &'a Account) -> ApiFuture<'a, TokenGrant> {
        Box::pin(async move {
            let request = TokenRequest {
                login: account.login.clone(),
                secret: account.secret.clone(),
            };
            let response = self
                .client
                .post(Self::endpoint(account, "token"))
                .json(&request)
                .send()
                .await
                .map_err(|e| ApiError::Request(e.to_string()))?;
            let body = Self::read_body(response).await?;
            let grant: TokenGrant =
                serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
            if grant.token.is_empty() {
                return Err(ApiError::Decode("server granted an empty token".into()));
            }
            Ok(grant)
        })
    }

    fn fetch_page<'a>(
        &'a self,
        account: &'a Account,
        catalog: CatalogKind,
        cursor: Option<CatalogCursor>,
    ) -> ApiFuture<'a, PageResponse> {
        Box::pin(async move {
            let mut query = vec![("token", Self::token(account)?)];
            if let Some(cursor) = cursor {
                query.push(("more", cursor.to_string()));
            }
            let response = self
                .client
                .get(Self::endpoint(account, catalog.as_str()))
                .query(&query)
                .send()
                .await
                .map_err(|e| ApiError::Request(e.to_string()))?;
            let body = Self::read_body(response).await?;
            PageResponse::from_json(&body).map_err(|e| ApiError::Decode(e.to_string()))
        })
    }

    fn push_document<'a>(
        &'a self,
        account: &'a Account,
        category: DocumentCategory,
        body: Value,
    ) -> ApiFuture<'a, PushResponse> {
        Box::pin(async move {
            let token = Self::token(account)?;
            let response = self
                .client
                .post(Self::endpoint(account, category.endpoint()))
                .query(&[("token", token)])
                .json(&body)
                .send()
                .await
                .map_err(|e| ApiError::Request(e.to_string()))?;
            let body = Self::read_body(response).await?;
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
        })
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
