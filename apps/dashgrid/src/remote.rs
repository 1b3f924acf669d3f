//! # Remote Client
//!
//! HTTP client for a dashgrid server acting as the remote copy.
//!
//! ```text
//! ┌──────────────────────┐          HTTP           ┌──────────────────────┐
//! │  dashgrid (client)   │ ◄───────────────────►   │  dashgrid serve      │
//! │                      │  GET  /health           │                      │
//! │  SyncedStorage       │  GET  /dashboard        │  api::router         │
//! │   └─ HttpRemote      │  PUT  /dashboard        │   └─ local store     │
//! └──────────────────────┘                         └──────────────────────┘
//! ```

use crate::error::{AppError, AppResult};
use dashgrid_core::DashboardState;
use dashgrid_core::formats::from_json;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Request timeout for every remote call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error body returned by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Client for the remote dashboard endpoint.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRemote {
    /// Create a client for `base_url`, sending `Authorization: Bearer <key>`
    /// when an API key is given.
    pub fn new(base_url: impl Into<String>, api_key: Option<&str>) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| AppError::Config(format!("invalid API key header: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Health check.
    pub async fn health(&self) -> AppResult<HealthResponse> {
        let url = format!("{}/health", self.base_url);
        let resp = self.client.get(&url).send().await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Fetch the remote document. `None` when the remote has none yet.
    ///
    /// The body is decoded with schema migration and validation, like any
    /// local load.
    pub async fn fetch(&self) -> AppResult<Option<DashboardState>> {
        let url = format!("{}/dashboard", self.base_url);
        let resp = self.client.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(url = %url, "remote has no dashboard");
            return Ok(None);
        }

        let resp = check_status(resp).await?;
        let bytes = resp.bytes().await?;
        Ok(Some(from_json(&bytes)?))
    }

    /// Replace the remote document.
    ///
    /// Fails with [`AppError::StaleWrite`] when the remote already holds a
    /// newer document.
    pub async fn push(&self, state: &DashboardState) -> AppResult<()> {
        let url = format!("{}/dashboard", self.base_url);
        let resp = self.client.put(&url).json(state).send().await?;
        if resp.status() == StatusCode::CONFLICT {
            return Err(AppError::StaleWrite);
        }
        check_status(resp).await?;
        debug!(url = %url, revision = state.revision, "dashboard pushed");
        Ok(())
    }
}

async fn check_status(resp: reqwest::Response) -> AppResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(AppError::Remote {
        status: status.as_u16(),
        message,
    })
}
