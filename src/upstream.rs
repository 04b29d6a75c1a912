//! Upstream-call helper for the AI / voice / image backend ("Luna Services").
//!
//! One POST, no retries. Failures are reported as one of the three
//! [`UpstreamError`] kinds; tools decide whether to propagate or fall back.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::error::UpstreamError;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY_CHARS: usize = 400;

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn post_json(&self, path: &str, payload: &Value) -> Result<Value, UpstreamError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "upstream: POST");

        let resp = self
            .client
            .post(&url)
            .json(payload)
            .timeout(UPSTREAM_TIMEOUT)
            .send()
            .await
            .map_err(|e| UpstreamError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::BadStatus {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        resp.json::<Value>().await.map_err(|e| {
            tracing::warn!(url = %url, "upstream: invalid JSON body: {}", e);
            UpstreamError::BadBody
        })
    }
}
