//! AuditLimit Gate - admission control in front of a conversational-AI proxy.
//!
//! Every chat request is checked before it reaches the upstream model: it is
//! admitted, rejected for content or entitlement reasons, or throttled
//! because the caller exhausted its budget for the requested model tier.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       AUDIT GATE (auditlimit)                    │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  POST /audit_limit    GET /health    GET /metrics                │
//! │         │                                                        │
//! │  ┌──────┴──────────────────────────────────┐                     │
//! │  │ Middleware: Tracing → Timeout → Limit   │                     │
//! │  └──────┬──────────────────────────────────┘                     │
//! │         │                                                        │
//! │  ┌──────┴──────────┐                                             │
//! │  │  AdmissionGate  │                                             │
//! │  └──┬───────┬──────┴─────────┐                                   │
//! │     ▼       ▼                ▼                                   │
//! │  Content  Entitlement    VisitorRegistry ──► TokenBucket (1/key) │
//! │  Filter   Resolver                                               │
//! └─────┼───────┼────────────────────────────────────────────────────┘
//!       ▼       ▼
//!  Moderation  Entitlement service + cache
//! ```
//!
//! # Failure policy
//!
//! - Moderation outage: request passes the content filter (fail-open)
//! - Entitlement outage: caller is treated as non-premium (fail-closed)
//! - Neither outage is cached or surfaced to the caller as an error
//!
//! # Usage
//!
//! ```ignore
//! use auditlimit_gate::{AuditLimitService, GateConfig};
//!
//! let config = GateConfig::load(None)?;
//! let mut service = AuditLimitService::new(config)?;
//! service.start().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod gate;
pub mod limiter;
pub mod middleware;
pub mod policy;
pub mod ports;
pub mod service;

// Re-exports for public API
pub use domain::{
    AdmissionDecision, BlockReason, ConfigError, DependencyError, GateConfig, GateError, Tier,
};
pub use gate::AdmissionGate;
pub use limiter::{TokenBucket, VisitorKey, VisitorRegistry};
pub use middleware::GateMetrics;
pub use policy::{ContentFilter, ContentVerdict, EntitlementResolver};
pub use service::{AuditLimitService, Dependencies};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
