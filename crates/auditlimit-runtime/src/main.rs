//! # AuditLimit
//!
//! Entry point for the audit gate.
//!
//! ## Startup Sequence
//!
//! 1. Install logging (`AUDITLIMIT_LOG_LEVEL`, `AUDITLIMIT_JSON_LOGS`)
//! 2. Load configuration: defaults, then `--config` TOML, then environment
//! 3. Build the service and its HTTP clients
//! 4. Serve until Ctrl+C, then drain in-flight requests

use std::path::PathBuf;

use anyhow::{Context, Result};
use auditlimit_gate::{AuditLimitService, GateConfig};
use auditlimit_telemetry::{init_telemetry, TelemetryConfig};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "auditlimit")]
#[command(about = "Admission gate for chat requests: content filter, entitlement and rate limits")]
#[command(version)]
struct Args {
    /// TOML configuration file. Environment variables override its values.
    #[arg(short, long, env = "AUDITLIMIT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_telemetry(&TelemetryConfig::from_env()).context("failed to initialize logging")?;

    let config = GateConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    config.log_summary();

    let mut service = AuditLimitService::new(config).context("failed to build audit gate")?;
    service.start().await?;

    info!("Audit gate is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    service.shutdown().await?;
    Ok(())
}
