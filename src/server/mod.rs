//! Server layer root module.
//!
//! This module organizes the backend components, including:
//! - Application state and routing
//! - Room actors (phase machine, clocks, live subscribers)
//! - The room index (directory, matchmaking queues, wait estimates)
//! - Error codes and durable storage plumbing

use std::time::{SystemTime, UNIX_EPOCH};

pub mod api;
pub mod error;
pub mod index;
pub mod room;
pub mod router;
pub mod state;
pub mod storage;

/// Wall-clock now in epoch milliseconds. Every operation reads this once
/// and uses the same value throughout.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
