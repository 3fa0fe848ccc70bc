//! Scoring API client
//!
//! Thin JSON client for the two endpoints the service needs. Every request
//! carries the session token as a bearer header.

use crate::payload::JobMatch;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response; `message` is the best text the server gave
    #[error("{message}")]
    Status { status: u16, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckMatchesRequest {
    #[serde(rename = "resumeId")]
    pub resume_id: String,
    #[serde(rename = "minScore")]
    pub min_score: f64,
    /// Sent as `null` when the page's board is unknown
    #[serde(rename = "platformSource")]
    pub platform_source: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CheckMatchesResponse {
    matches: Vec<JobMatch>,
}

#[derive(Debug, Serialize)]
struct SubmitLinksRequest<'a> {
    urls: &'a [String],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitLinksResponse {
    pub submitted: u32,
    pub skipped: u32,
}

/// The calls the service makes against the scoring API
#[async_trait]
pub trait MatchApi: Send + Sync {
    async fn check_matches(
        &self,
        token: &str,
        request: &CheckMatchesRequest,
    ) -> Result<Vec<JobMatch>, ApiError>;

    async fn submit_links(
        &self,
        token: &str,
        urls: &[String],
    ) -> Result<SubmitLinksResponse, ApiError>;
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B, T>(&self, token: &str, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("POST {}", url);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = match resp.text().await {
                Ok(body) => error_message(&body),
                Err(_) => format!("Request failed (HTTP {})", status.as_u16()),
            };
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl MatchApi for ApiClient {
    async fn check_matches(
        &self,
        token: &str,
        request: &CheckMatchesRequest,
    ) -> Result<Vec<JobMatch>, ApiError> {
        let response: CheckMatchesResponse =
            self.post(token, "/api/ext/check-matches", request).await?;
        Ok(response.matches)
    }

    async fn submit_links(
        &self,
        token: &str,
        urls: &[String],
    ) -> Result<SubmitLinksResponse, ApiError> {
        self.post(token, "/api/ext/submit-links", &SubmitLinksRequest { urls })
            .await
    }
}

/// Pick the message out of an error body: JSON `error`, then JSON `message`,
/// then the raw body, then a generic fallback
pub fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "message"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    return text.to_string();
                }
            }
        }
        return body.to_string();
    }

    if body.trim().is_empty() {
        "Request failed".to_string()
    } else {
        body.to_string()
    }
}
