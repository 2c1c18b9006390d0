/// Matchmaking configuration.
/// Supported time controls, in the order join-all scans them.
pub const TIME_CONTROLS: [u64; 3] = [300_000, 600_000, 900_000];

/// Queue entries without a heartbeat for this long are dropped.
pub const QUEUE_STALE_MS: u64 = 300_000;
