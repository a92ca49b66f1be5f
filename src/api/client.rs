//! HTTP client for the agent analysis API.
//!
//! One `POST` endpoint per agent, a combined `analyze` endpoint and
//! `generate-pdf`. Upstream failures are returned as [`ApiError`] without
//! retrying.

use super::AnalysisBackend;
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::models::{AgentName, PatientCase};
use crate::report::ReportPayload;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Client for the analysis API.
pub struct AnalysisClient {
    base_url: String,
    timeout_seconds: u64,
    http_client: reqwest::Client,
    access_token: Option<String>,
}

impl AnalysisClient {
    /// Create a client for the configured API.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        info!("Analysis API at {}", config.base_url);

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_seconds: config.timeout_seconds,
            http_client,
            access_token: None,
        })
    }

    /// Attach the signed-in user's bearer token to every request.
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn map_send_error(&self, endpoint: &str, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_seconds: self.timeout_seconds,
            }
        } else if e.is_connect() {
            ApiError::Connect(self.base_url.clone())
        } else {
            ApiError::Transport {
                endpoint: endpoint.to_string(),
                source: e,
            }
        }
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.endpoint_url(endpoint);
        debug!("POST {}", url);

        let mut request = self.http_client.post(&url).json(body);
        if let Some(ref token) = self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_send_error(endpoint, e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status,
                body,
            });
        }

        Ok(response)
    }

    async fn post_for_json<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Value, ApiError> {
        let response = self.post(endpoint, body).await?;

        response.json::<Value>().await.map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    /// Render the report payload to a PDF document.
    pub async fn generate_pdf(&self, payload: &ReportPayload) -> Result<Vec<u8>, ApiError> {
        let endpoint = "generate-pdf";
        let response = self.post(endpoint, payload).await?;

        let bytes = response.bytes().await.map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        debug!("Received {} byte PDF", bytes.len());
        Ok(bytes.to_vec())
    }
}

impl AnalysisBackend for AnalysisClient {
    async fn run_agent(&self, agent: AgentName, case: &PatientCase) -> Result<Value, ApiError> {
        self.post_for_json(agent.endpoint(), case).await
    }

    async fn analyze(&self, case: &PatientCase) -> Result<Value, ApiError> {
        self.post_for_json("analyze", case).await
    }
}
