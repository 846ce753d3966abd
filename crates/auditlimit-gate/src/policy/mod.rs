//! Content and entitlement policies consulted by the gate.

pub mod content;
pub mod entitlement;

pub use content::{ContentFilter, ContentVerdict};
pub use entitlement::EntitlementResolver;
