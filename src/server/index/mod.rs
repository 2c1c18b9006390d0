//! Index side: room directory, matchmaking queues and wait estimates.

pub mod actor;
pub mod entry;
pub mod estimate;
pub mod messages;
pub mod session;
