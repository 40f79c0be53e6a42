//! HTTP client for the Lumio API.
//!
//! Implements the upload orchestrator's transport (one multipart request per
//! photo attempt) and completion notifier on top of a shared reqwest client
//! with configurable auth (Bearer token or X-API-Key).

pub mod api;

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_API_VERSION: &str = "v1";
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Authentication strategy for the API.
#[derive(Clone, Debug)]
pub enum Auth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// `X-API-Key: {key}`
    XApiKey(String),
}

/// HTTP client for the Lumio API with configurable auth.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_version: String,
    auth: Auth,
}

impl ApiClient {
    /// Per-request timeouts are set by each upload attempt, so the client
    /// itself only bounds connection setup.
    pub fn new(base_url: impl Into<String>, auth: Auth) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            auth,
        })
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Create client from environment: LUMIO_API_URL, LUMIO_API_KEY and
    /// optionally LUMIO_API_VERSION. Uses X-API-Key auth.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("LUMIO_API_KEY")
            .context("Missing API key. Set LUMIO_API_KEY")?;
        Self::from_env_with_auth(Auth::XApiKey(api_key))
    }

    /// Create client from environment using Bearer auth: LUMIO_API_TOKEN or
    /// LUMIO_API_KEY.
    pub fn from_env_bearer() -> Result<Self> {
        let token = std::env::var("LUMIO_API_TOKEN")
            .or_else(|_| std::env::var("LUMIO_API_KEY"))
            .context("Missing token. Set LUMIO_API_TOKEN or LUMIO_API_KEY")?;
        Self::from_env_with_auth(Auth::Bearer(token))
    }

    fn from_env_with_auth(auth: Auth) -> Result<Self> {
        let base_url =
            std::env::var("LUMIO_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let client = Self::new(base_url, auth)?;

        Ok(match std::env::var("LUMIO_API_VERSION") {
            Ok(version) if !version.trim().is_empty() => client.with_api_version(version.trim()),
            _ => client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// API version prefix (e.g. "/api/v1").
    pub fn api_prefix(&self) -> String {
        format!("/api/{}", self.api_version)
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.api_prefix(), path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => request.header("Authorization", format!("Bearer {}", token)),
            Auth::XApiKey(key) => request.header("X-API-Key", key.as_str()),
        }
    }

    /// POST without a body. Any 2xx status is success; the response body is
    /// ignored.
    pub async fn post_empty(&self, path: &str) -> Result<()> {
        let url = self.build_url(path);
        let request = self.apply_auth(self.client.post(&url));

        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        Ok(())
    }

    /// Raw client for custom requests. Caller must apply auth via build_url and headers.
    pub fn client(&self) -> &Client {
        &self.client
    }
}
