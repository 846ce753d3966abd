//! Domain types for the admission gate.
//!
//! Configuration, decisions, request parsing and error handling. No I/O.

pub mod config;
pub mod decision;
pub mod entitlement;
pub mod error;
pub mod request;
pub mod request_id;

// Re-exports for convenience
pub use config::{ConfigError, GateConfig, TierConfig};
pub use decision::{AdmissionDecision, BlockReason, Tier};
pub use entitlement::EntitlementRecord;
pub use error::{CacheError, DependencyError, GateError};
pub use request::{bearer_identity, ChatRequest, RequestError};
pub use request_id::{RequestId, REQUEST_ID_HEADER};
