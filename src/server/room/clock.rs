//! Move-time accounting, flag fall and terminal detection.
//!
//! Elapsed time is always charged to the side whose turn it is, measured
//! from `lastTickAt` to the operation's `now`. A flag fall only counts as
//! a win if the opponent retains mating material; otherwise the timeout
//! resolves as a draw.

use crate::config;
use crate::game::engine::ChessEngine;
use crate::game::types::{parse_move, SideColor};
use crate::server::error::ApiError;
use crate::server::room::room::{MoveRecord, Phase, Room};

/// Terminal verdicts reported by the engine after a legal move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    FiftyMove,
    ThreefoldRepetition,
}

impl Terminal {
    pub fn reason(self) -> &'static str {
        match self {
            Terminal::Checkmate => "checkmate",
            Terminal::Stalemate => "stalemate",
            Terminal::InsufficientMaterial => "insufficient_material",
            Terminal::FiftyMove => "fifty_move",
            Terminal::ThreefoldRepetition => "threefold_repetition",
        }
    }
}

pub fn detect_terminal(engine: &ChessEngine) -> Option<Terminal> {
    if engine.is_checkmate() {
        return Some(Terminal::Checkmate);
    }
    if engine.is_stalemate() {
        return Some(Terminal::Stalemate);
    }
    if engine.is_insufficient_material() {
        return Some(Terminal::InsufficientMaterial);
    }
    if engine.can_declare_draw() {
        return Some(if engine.halfmove_clock() >= 100 {
            Terminal::FiftyMove
        } else {
            Terminal::ThreefoldRepetition
        });
    }
    None
}

/// Clock of the side to move after charging the elapsed time.
pub fn remaining_after(room: &Room, now: u64) -> Option<i64> {
    let clocks = room.clocks.as_ref()?;
    let elapsed = now.saturating_sub(clocks.last_tick_at) as i64;
    Some(match clocks.turn {
        SideColor::White => clocks.white_remaining_ms - elapsed,
        SideColor::Black => clocks.black_remaining_ms - elapsed,
    })
}

/// Settles a fallen flag: the side to move loses on time unless the
/// opponent cannot mate, in which case the game is drawn.
fn settle_flag(room: &mut Room, engine: &ChessEngine, now: u64) {
    let flagged_color = match room.clocks.as_ref() {
        Some(clocks) => clocks.turn,
        None => return,
    };
    if let Some(clocks) = room.clocks.as_mut() {
        match flagged_color {
            SideColor::White => clocks.white_remaining_ms = 0,
            SideColor::Black => clocks.black_remaining_ms = 0,
        }
        clocks.last_tick_at = now;
    }
    let flagged_player = room
        .colors
        .iter()
        .find(|(_, side)| **side == flagged_color)
        .map(|(id, _)| id.clone());
    let opponent_material = engine.material(flagged_color.opposite());
    if opponent_material.can_mate() {
        let winner = flagged_player.and_then(|id| room.opponent_of(&id));
        room.finish(
            winner,
            "time_forfeit",
            None,
            config::room::REMATCH_WINDOW_MS,
            now,
        );
    } else {
        room.finish(
            None,
            "draw",
            Some("timeout_but_opponent_cannot_mate"),
            config::room::REMATCH_WINDOW_SHORT_MS,
            now,
        );
    }
}

/// Applies one move end to end: charge the clock, handle a flag fall,
/// validate with the engine, record the move and detect terminal
/// positions. Mutates `room` and `engine` only on an accepted outcome.
pub fn apply_move(
    room: &mut Room,
    engine: &mut ChessEngine,
    player_id: &str,
    raw_move: &str,
    now: u64,
) -> Result<(), ApiError> {
    if room.phase != Phase::Playing {
        return Err(ApiError::NotPlaying);
    }
    if room.seat_of(player_id).is_none() {
        return Err(ApiError::UnknownPlayer);
    }
    let color = *room
        .colors
        .get(player_id)
        .ok_or(ApiError::UnknownPlayerColor)?;
    let turn = room
        .clocks
        .as_ref()
        .map(|clocks| clocks.turn)
        .ok_or(ApiError::NotPlaying)?;
    if turn != color {
        return Err(ApiError::NotYourTurn);
    }
    let parsed = parse_move(raw_move).ok_or(ApiError::InvalidMoveFormat)?;

    let remaining = remaining_after(room, now).ok_or(ApiError::NotPlaying)?;
    if remaining <= 0 {
        settle_flag(room, engine, now);
        return Ok(());
    }

    if engine.requires_promotion(&parsed) && parsed.promotion.is_none() {
        return Err(ApiError::InvalidMoveFormat);
    }
    if !engine.try_move(&parsed) {
        return Err(ApiError::IllegalMove);
    }

    if let Some(clocks) = room.clocks.as_mut() {
        match color {
            SideColor::White => clocks.white_remaining_ms = remaining,
            SideColor::Black => clocks.black_remaining_ms = remaining,
        }
        clocks.last_tick_at = now;
        clocks.turn = color.opposite();
    }
    room.moves.push(MoveRecord {
        by: player_id.to_string(),
        mv: raw_move.to_string(),
        at: now,
    });
    room.game_fen = Some(engine.fen());
    if room.disconnected_player_id.as_deref() == Some(player_id) {
        room.clear_disconnect();
    }
    room.updated_at = now;

    match detect_terminal(engine) {
        Some(Terminal::Checkmate) => room.finish(
            Some(player_id.to_string()),
            "checkmate",
            None,
            config::room::REMATCH_WINDOW_MS,
            now,
        ),
        Some(draw) => room.finish(
            None,
            "draw",
            Some(draw.reason()),
            config::room::REMATCH_WINDOW_MS,
            now,
        ),
        None => {}
    }
    Ok(())
}

/// Claims a flag that already fell: if the side to move is out of time,
/// runs the flag-fall resolution. Returns whether the room changed.
pub fn claim_flag(room: &mut Room, engine: &ChessEngine, now: u64) -> Result<bool, ApiError> {
    if room.phase != Phase::Playing {
        return Err(ApiError::NotPlaying);
    }
    match remaining_after(room, now) {
        Some(remaining) if remaining <= 0 => {
            settle_flag(room, engine, now);
            Ok(true)
        }
        Some(_) => Ok(false),
        None => Err(ApiError::NotPlaying),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::room::room::RoomInit;

    /// Playing room: p1 is white on 30s, p2 is black on 300s.
    fn playing_room(now: u64) -> (Room, ChessEngine) {
        let mut room = Room::new("r1", RoomInit::default(), now);
        room.join("p1", "Alice", now).expect("p1 joins");
        room.join("p2", "Bob", now).expect("p2 joins");
        room.start_bidding("p1", now).expect("stage");
        room.start_bidding("p2", now).expect("confirm");
        room.submit_bid("p1", 30_000, now).expect("bid p1");
        room.submit_bid("p2", 45_000, now).expect("bid p2");
        room.choose_color("p1", SideColor::White, now).expect("choice");
        (room, ChessEngine::new())
    }

    #[test]
    fn legal_move_charges_the_mover_and_flips_the_turn() {
        let (mut room, mut engine) = playing_room(1_000);
        apply_move(&mut room, &mut engine, "p1", "e2e4", 3_500).expect("move accepted");
        let clocks = room.clocks.as_ref().expect("clocks");
        assert_eq!(clocks.white_remaining_ms, 30_000 - 2_500);
        assert_eq!(clocks.black_remaining_ms, 300_000);
        assert_eq!(clocks.turn, SideColor::Black);
        assert_eq!(clocks.last_tick_at, 3_500);
        assert_eq!(room.moves.len(), 1);
        assert_eq!(room.moves[0].by, "p1");
        assert_eq!(room.moves[0].mv, "e2e4");
        assert!(room.game_fen.is_some());
    }

    #[test]
    fn wrong_turn_and_bad_format_are_rejected() {
        let (mut room, mut engine) = playing_room(1_000);
        assert_eq!(
            apply_move(&mut room, &mut engine, "p2", "e7e5", 1_100),
            Err(ApiError::NotYourTurn)
        );
        assert_eq!(
            apply_move(&mut room, &mut engine, "p1", "e2", 1_100),
            Err(ApiError::InvalidMoveFormat)
        );
        assert_eq!(
            apply_move(&mut room, &mut engine, "p1", "e2e5", 1_100),
            Err(ApiError::IllegalMove)
        );
        assert_eq!(
            apply_move(&mut room, &mut engine, "ghost", "e2e4", 1_100),
            Err(ApiError::UnknownPlayer)
        );
        assert!(room.moves.is_empty());
    }

    #[test]
    fn flag_fall_against_mating_material_forfeits() {
        let (mut room, mut engine) = playing_room(1_000);
        // White's 30s run out; black has full material.
        let late = 1_000 + 30_001;
        apply_move(&mut room, &mut engine, "p1", "e2e4", late).expect("flag settles");
        assert_eq!(room.phase, Phase::Finished);
        assert_eq!(room.result.as_deref(), Some("time_forfeit"));
        assert_eq!(room.winner_id.as_deref(), Some("p2"));
        assert!(room.moves.is_empty());
        let clocks = room.clocks.as_ref().expect("clocks");
        assert_eq!(clocks.white_remaining_ms, 0);
        assert_eq!(clocks.frozen_at, Some(late));
    }

    #[test]
    fn flag_fall_against_a_lone_knight_is_a_draw() {
        let (mut room, mut engine) = playing_room(1_000);
        // Black keeps only king and knight.
        engine = ChessEngine::from_fen("4k2n/8/8/8/8/8/8/4K3 w - - 0 1").expect("fen");
        if let Some(clocks) = room.clocks.as_mut() {
            clocks.white_remaining_ms = 100;
        }
        let late = 1_000 + 600;
        apply_move(&mut room, &mut engine, "p1", "e1e2", late).expect("flag settles");
        assert_eq!(room.phase, Phase::Finished);
        assert_eq!(room.result.as_deref(), Some("draw"));
        assert_eq!(
            room.result_reason.as_deref(),
            Some("timeout_but_opponent_cannot_mate")
        );
        assert!(room.winner_id.is_none());
        assert_eq!(
            room.rematch_window_ends,
            Some(late + config::room::REMATCH_WINDOW_SHORT_MS)
        );
    }

    #[test]
    fn checkmate_finishes_with_the_mover_as_winner() {
        let (mut room, mut engine) = playing_room(1_000);
        let script = [
            ("p1", "e2e4"),
            ("p2", "e7e5"),
            ("p1", "f1c4"),
            ("p2", "b8c6"),
            ("p1", "d1h5"),
            ("p2", "g8f6"),
            ("p1", "h5f7"),
        ];
        for (i, (player, mv)) in script.iter().enumerate() {
            apply_move(&mut room, &mut engine, player, mv, 1_000 + (i as u64 + 1) * 100)
                .unwrap_or_else(|e| panic!("move {mv} rejected: {e}"));
        }
        assert_eq!(room.phase, Phase::Finished);
        assert_eq!(room.result.as_deref(), Some("checkmate"));
        assert_eq!(room.winner_id.as_deref(), Some("p1"));
        assert_eq!(room.moves.len(), 7);
    }

    #[test]
    fn stalemate_finishes_as_a_draw() {
        let (mut room, mut engine) = playing_room(1_000);
        engine = ChessEngine::from_fen("7k/8/6K1/5Q2/8/8/8/8 w - - 0 1").expect("fen");
        apply_move(&mut room, &mut engine, "p1", "f5f7", 1_200).expect("move accepted");
        assert_eq!(room.phase, Phase::Finished);
        assert_eq!(room.result.as_deref(), Some("draw"));
        assert_eq!(room.result_reason.as_deref(), Some("stalemate"));
    }

    #[test]
    fn promotion_rank_move_requires_a_letter() {
        let (mut room, mut engine) = playing_room(1_000);
        engine = ChessEngine::from_fen("7k/P7/8/8/8/8/8/7K w - - 0 1").expect("fen");
        assert_eq!(
            apply_move(&mut room, &mut engine, "p1", "a7a8", 1_200),
            Err(ApiError::InvalidMoveFormat)
        );
        apply_move(&mut room, &mut engine, "p1", "a7a8q", 1_300).expect("promotion accepted");
        assert_eq!(room.moves.len(), 1);
    }

    #[test]
    fn move_by_the_disconnected_side_clears_the_flag() {
        let (mut room, mut engine) = playing_room(1_000);
        room.disconnected_player_id = Some("p1".to_string());
        room.disconnect_start = Some(1_000);
        apply_move(&mut room, &mut engine, "p1", "e2e4", 1_500).expect("move accepted");
        assert!(room.disconnected_player_id.is_none());
        assert!(room.disconnect_start.is_none());
    }

    #[test]
    fn claim_flag_is_a_noop_while_time_remains() {
        let (mut room, engine) = playing_room(1_000);
        assert_eq!(claim_flag(&mut room, &engine, 1_100), Ok(false));
        assert_eq!(room.phase, Phase::Playing);
        assert_eq!(claim_flag(&mut room, &engine, 1_000 + 30_001), Ok(true));
        assert_eq!(room.phase, Phase::Finished);
        assert_eq!(room.result.as_deref(), Some("time_forfeit"));
        assert_eq!(room.winner_id.as_deref(), Some("p2"));
    }
}
