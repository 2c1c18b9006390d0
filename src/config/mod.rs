/// Main configuration module.
///
/// Re-exports submodules for room lifecycle and matchmaking configuration.
pub mod matchmaking;
pub mod room;
