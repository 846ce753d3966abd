//! # AuditLimit Telemetry
//!
//! Structured logging for the audit gate, built on `tracing-subscriber`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auditlimit_telemetry::{init_telemetry, TelemetryConfig};
//!
//! init_telemetry(&TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `AUDITLIMIT_LOG_LEVEL` | `info` | Log level or filter directives (falls back to `RUST_LOG`) |
//! | `AUDITLIMIT_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `AUDITLIMIT_SERVICE_NAME` | `auditlimit` | Service name in the startup log |

mod config;
mod logging;

pub use config::TelemetryConfig;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

/// Install the process-wide subscriber. Fails if one is already set.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    logging::init_logging(config)?;

    tracing::info!(
        service = %config.service_name,
        level = %config.log_level,
        json = config.json_logs,
        "Logging initialized"
    );
    Ok(())
}
