//! HTTP entitlement client.

use crate::domain::{DependencyError, GateError};
use crate::ports::EntitlementClient;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct EntitlementRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct EntitlementResponse {
    is_plus_valid: Option<bool>,
}

/// Posts `{"token": identity}` and reads `is_plus_valid` from the reply
pub struct HttpEntitlementClient {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpEntitlementClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, GateError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }
}

#[async_trait]
impl EntitlementClient for HttpEntitlementClient {
    async fn is_premium(&self, identity: &str) -> Result<bool, DependencyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EntitlementRequest { token: identity })
            .send()
            .await
            .map_err(|e| DependencyError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DependencyError::Status(status.as_u16()));
        }

        let body: EntitlementResponse = response
            .json()
            .await
            .map_err(|e| DependencyError::from_reqwest(e, self.timeout))?;

        body.is_plus_valid
            .ok_or_else(|| DependencyError::Malformed("missing is_plus_valid".into()))
    }
}
