//! Middleware stack for the audit endpoint.
//!
//! Layer order: Request → Tracing → Timeout → 413 detail → BodyLimit → Handler

pub mod metrics;
pub mod timeout;
pub mod tracing;

pub use metrics::{GateMetrics, RequestTimer};
pub use timeout::TimeoutLayer;
pub use tracing::TracingLayer;
