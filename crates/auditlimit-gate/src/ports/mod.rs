//! Ports (hexagonal boundaries) of the admission gate.

pub mod outbound;

pub use outbound::{
    Clock, EntitlementCache, EntitlementClient, ManualClock, ModerationClient, SystemClock,
};
