//! Per-visitor, per-tier rate limiting.

pub mod bucket;
pub mod registry;

pub use bucket::{Acquire, TokenBucket};
pub use registry::{cleanup_task, VisitorKey, VisitorRegistry};
