//! Client for the external derive-and-check service
//!
//! The service derives every requested address from the seed, queries each
//! chain's data provider and answers with the filtered and the complete
//! record lists in one response.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::SearchError;
use crate::protocol::{SearchResult, ServiceErrorBody};
use crate::redact::describe_seed;
use crate::request::SearchRequest;

/// Longest non-JSON error body echoed back to the operator.
const MAX_ERROR_BODY: usize = 300;

/// Anything that can run a derive-and-check round trip.
#[async_trait]
pub trait DeriveService: Send + Sync {
    async fn derive_and_check(&self, request: &SearchRequest) -> Result<SearchResult, SearchError>;

    /// Cheap reachability check.
    async fn probe(&self) -> Result<(), SearchError>;
}

/// HTTP implementation of `DeriveService`.
pub struct HttpDeriveService {
    client: Client,
    base_url: String,
}

impl HttpDeriveService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = base_url.trim_end_matches('/').to_string();
        info!("Derivation service client initialized with URL: {}", base_url);

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.service_url, config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl DeriveService for HttpDeriveService {
    async fn derive_and_check(&self, request: &SearchRequest) -> Result<SearchResult, SearchError> {
        let url = format!("{}/derive_and_check", self.base_url);

        info!(
            "Requesting derivation: seed={} passphrase={} networks={:?} accounts={} addresses={} max_derived={}",
            describe_seed(request.seed_phrase()),
            !request.passphrase().is_empty(),
            request.selected_networks(),
            request.account_range(),
            request.address_range(),
            request.max_derived_addresses()
        );

        let response = self
            .client
            .post(&url)
            .json(&request.to_wire())
            .send()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = service_error_message(status, &body);
            warn!("Derivation service returned {}: {}", status, message);
            return Err(SearchError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let result: SearchResult =
            serde_json::from_str(&body).map_err(|e| SearchError::MalformedResponse(e.to_string()))?;

        info!(
            "Derivation OK: results={} derived={}",
            result.results.len(),
            result.all_derived_wallets.len()
        );

        Ok(result)
    }

    async fn probe(&self) -> Result<(), SearchError> {
        let url = format!("{}/", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        // 404 still proves the service is listening
        if response.status().is_success() || response.status().as_u16() == 404 {
            Ok(())
        } else {
            Err(SearchError::Service {
                status: response.status().as_u16(),
                message: format!("service returned status: {}", response.status()),
            })
        }
    }
}

/// The `error` field verbatim, else the (shortened) body, else the status.
fn service_error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ServiceErrorBody>(body) {
        if let Some(message) = parsed.error.filter(|m| !m.trim().is_empty()) {
            return message;
        }
    }

    let body = body.trim();
    if body.is_empty() {
        return format!("service returned status: {}", status);
    }
    if body.chars().count() > MAX_ERROR_BODY {
        let cut: String = body.chars().take(MAX_ERROR_BODY).collect();
        return format!("{}...", cut);
    }
    body.to_string()
}
