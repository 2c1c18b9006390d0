//! Room side: the per-room actor, its phase machine and live subscribers.

pub mod actor;
pub mod bidding;
pub mod clock;
pub mod messages;
pub mod registry;
pub mod room;
pub mod session;
