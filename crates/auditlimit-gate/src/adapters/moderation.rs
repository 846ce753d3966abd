//! HTTP moderation client (OpenAI moderation API shape).

use crate::domain::{DependencyError, GateError};
use crate::ports::ModerationClient;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ModerationRequest<'a> {
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    #[serde(default)]
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    flagged: Option<bool>,
}

/// Moderation client posting `{"input": text}` with a bearer key.
pub struct HttpModerationClient {
    client: Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl HttpModerationClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GateError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout,
        })
    }
}

#[async_trait]
impl ModerationClient for HttpModerationClient {
    async fn is_flagged(&self, text: &str) -> Result<bool, DependencyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ModerationRequest { input: text })
            .send()
            .await
            .map_err(|e| DependencyError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DependencyError::Status(status.as_u16()));
        }

        let body: ModerationResponse = response
            .json()
            .await
            .map_err(|e| DependencyError::from_reqwest(e, self.timeout))?;

        body.results
            .first()
            .and_then(|r| r.flagged)
            .ok_or_else(|| DependencyError::Malformed("missing results[0].flagged".into()))
    }
}
