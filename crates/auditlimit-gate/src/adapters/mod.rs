//! Outbound adapters implementing the ports.

pub mod cache;
pub mod entitlement;
pub mod moderation;

pub use cache::MemoryEntitlementCache;
pub use entitlement::HttpEntitlementClient;
pub use moderation::HttpModerationClient;
