//! Error types for the gate and its outbound collaborators.
//!
//! None of these reach a caller as-is: dependency and cache errors are
//! absorbed by the policy components, gate errors only occur at startup.

use std::time::Duration;

/// Outbound call failure (moderation or entitlement service)
#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    /// Connection or protocol failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The call exceeded its timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success HTTP status
    #[error("unexpected status {0}")]
    Status(u16),

    /// Response body did not have the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl DependencyError {
    /// Map a reqwest error, preserving timeouts.
    pub fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            Self::Timeout(timeout)
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Entitlement cache failure
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Backing store unreachable
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Gate-level errors (startup and server lifecycle)
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// HTTP client construction failed
    #[error("http client error: {0}")]
    Client(String),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Server stopped with an error
    #[error("server error: {0}")]
    Serve(String),
}
