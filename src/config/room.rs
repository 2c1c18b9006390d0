/// Room lifecycle constants.
///
/// All durations are wall-clock milliseconds; deadlines stored on the room
/// are absolute timestamps derived from these.
pub const MAX_PLAYERS: usize = 2;

/// Base clock per side when the creator does not configure one.
pub const DEFAULT_MAIN_TIME_MS: u64 = 300_000;

/// How long a bidding round stays open before missing bids are defaulted.
pub const DEFAULT_BID_DURATION_MS: u64 = 30_000;

/// How long the current picker has to choose a color.
pub const DEFAULT_CHOICE_DURATION_MS: u64 = 30_000;

/// Window for the second player to confirm a staged start request.
pub const START_CONFIRM_WINDOW_MS: u64 = 60_000;

/// Missed color choices before the game is abandoned as a draw.
pub const MAX_CHOICE_ATTEMPTS: u8 = 4;

/// A room with no activity for this long is expired and dropped.
pub const ROOM_STALE_MS: u64 = 300_000;

/// How long a closed room lingers (answering with its close reason)
/// before its record is dropped.
pub const CLOSED_RETENTION_MS: u64 = 600_000;

/// Silence during PLAYING before the waiting side is marked disconnected.
pub const DISCONNECT_GRACE_MS: u64 = 10_000;

/// Marked-disconnected time before the game is forfeited.
pub const DEFAULT_DISCONNECT_TIMEOUT_MS: u64 = 45_000;

/// Post-game window for both players to agree on a rematch.
pub const REMATCH_WINDOW_MS: u64 = 60_000;

/// Shortened rematch window after a flag fall the opponent could not
/// have converted anyway.
pub const REMATCH_WINDOW_SHORT_MS: u64 = 10_000;
