//! Adapter over the `chess` crate.
//!
//! The room machinery never touches the engine types directly; it consumes
//! this narrow surface: attempt a move, read the FEN, count material, and
//! query the terminal predicates.

use std::str::FromStr;

use chess::{Board, BoardStatus, ChessMove, Color, File, Game, Piece, Rank, Square};

use crate::game::types::{Material, ParsedMove, SideColor};

#[derive(Clone)]
pub struct ChessEngine {
    game: Game,
    /// Plies since the last pawn move or capture, for fifty-move reporting.
    halfmove_clock: u32,
}

impl Default for ChessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ChessEngine {
    /// Fresh game from the standard starting position.
    pub fn new() -> Self {
        Self {
            game: Game::new(),
            halfmove_clock: 0,
        }
    }

    /// Rebuild from a position snapshot. Move history (and therefore
    /// repetition tracking) starts over from the given position.
    pub fn from_fen(fen: &str) -> Option<Self> {
        let board = Board::from_str(fen).ok()?;
        Some(Self {
            game: Game::new_with_board(board),
            halfmove_clock: 0,
        })
    }

    pub fn fen(&self) -> String {
        self.game.current_position().to_string()
    }

    pub fn side_to_move(&self) -> SideColor {
        match self.game.side_to_move() {
            Color::White => SideColor::White,
            Color::Black => SideColor::Black,
        }
    }

    fn square(name: &str) -> Option<Square> {
        let bytes = name.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        let file = bytes[0].checked_sub(b'a')?;
        let rank = bytes[1].checked_sub(b'1')?;
        if file > 7 || rank > 7 {
            return None;
        }
        Some(Square::make_square(
            Rank::from_index(rank as usize),
            File::from_index(file as usize),
        ))
    }

    fn promotion_piece(letter: char) -> Option<Piece> {
        match letter {
            'q' => Some(Piece::Queen),
            'r' => Some(Piece::Rook),
            'b' => Some(Piece::Bishop),
            'n' => Some(Piece::Knight),
            _ => None,
        }
    }

    /// Whether the move pushes a pawn onto the last rank and therefore
    /// must carry a promotion letter.
    pub fn requires_promotion(&self, mv: &ParsedMove) -> bool {
        let (from, to) = match (Self::square(&mv.from), Self::square(&mv.to)) {
            (Some(f), Some(t)) => (f, t),
            _ => return false,
        };
        let board = self.game.current_position();
        board.piece_on(from) == Some(Piece::Pawn)
            && matches!(to.get_rank(), Rank::First | Rank::Eighth)
    }

    /// Attempts the move; returns false if the engine refuses it.
    pub fn try_move(&mut self, mv: &ParsedMove) -> bool {
        let (from, to) = match (Self::square(&mv.from), Self::square(&mv.to)) {
            (Some(f), Some(t)) => (f, t),
            _ => return false,
        };
        let promotion = match mv.promotion {
            Some(letter) => match Self::promotion_piece(letter) {
                Some(p) => Some(p),
                None => return false,
            },
            None => None,
        };
        let board = self.game.current_position();
        let moved_pawn = board.piece_on(from) == Some(Piece::Pawn);
        // En passant captures land on an empty square, hence the file check.
        let captured =
            board.piece_on(to).is_some() || (moved_pawn && from.get_file() != to.get_file());
        if !self.game.make_move(ChessMove::new(from, to, promotion)) {
            return false;
        }
        if moved_pawn || captured {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        true
    }

    pub fn is_checkmate(&self) -> bool {
        self.game.current_position().status() == BoardStatus::Checkmate
    }

    pub fn is_stalemate(&self) -> bool {
        self.game.current_position().status() == BoardStatus::Stalemate
    }

    /// Threefold repetition or the fifty-move rule.
    pub fn can_declare_draw(&self) -> bool {
        self.game.can_declare_draw()
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    /// Piece counts for one side, king excluded.
    pub fn material(&self, color: SideColor) -> Material {
        let board = self.game.current_position();
        let side = *board.color_combined(match color {
            SideColor::White => Color::White,
            SideColor::Black => Color::Black,
        });
        let count = |piece: Piece| (*board.pieces(piece) & side).popcnt();
        Material {
            queens: count(Piece::Queen),
            rooks: count(Piece::Rook),
            pawns: count(Piece::Pawn),
            minors: count(Piece::Bishop) + count(Piece::Knight),
        }
    }

    /// Neither side retains mating material.
    pub fn is_insufficient_material(&self) -> bool {
        !self.material(SideColor::White).can_mate() && !self.material(SideColor::Black).can_mate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::parse_move;

    fn mv(raw: &str) -> ParsedMove {
        parse_move(raw).expect("test move should parse")
    }

    #[test]
    fn opening_move_updates_fen_and_turn() {
        let mut engine = ChessEngine::new();
        assert_eq!(engine.side_to_move(), SideColor::White);
        assert!(engine.try_move(&mv("e2e4")));
        assert_eq!(engine.side_to_move(), SideColor::Black);
        assert!(engine.fen().contains("4P3"));
    }

    #[test]
    fn illegal_move_is_refused() {
        let mut engine = ChessEngine::new();
        assert!(!engine.try_move(&mv("e2e5")));
        assert!(!engine.try_move(&mv("e7e5")));
    }

    #[test]
    fn scholars_mate_is_checkmate() {
        let mut engine = ChessEngine::new();
        for raw in ["e2e4", "e7e5", "f1c4", "b8c6", "d1h5", "g8f6", "h5f7"] {
            assert!(engine.try_move(&mv(raw)), "move {raw} should be legal");
        }
        assert!(engine.is_checkmate());
    }

    #[test]
    fn promotion_requirement_and_execution() {
        let mut engine =
            ChessEngine::from_fen("7k/P7/8/8/8/8/8/7K w - - 0 1").expect("valid fen");
        assert!(engine.requires_promotion(&mv("a7a8")));
        assert!(!engine.requires_promotion(&mv("h1h2")));
        assert!(engine.try_move(&mv("a7a8q")));
        assert!(engine.fen().starts_with("Q6k"));
    }

    #[test]
    fn material_counts_per_side() {
        let engine =
            ChessEngine::from_fen("4k2n/8/8/8/8/8/8/4K2Q w - - 0 1").expect("valid fen");
        let black = engine.material(SideColor::Black);
        assert_eq!(black, Material { minors: 1, ..Material::default() });
        assert!(!black.can_mate());
        let white = engine.material(SideColor::White);
        assert_eq!(white.queens, 1);
        assert!(white.can_mate());
    }

    #[test]
    fn bare_kings_are_insufficient() {
        let engine = ChessEngine::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").expect("valid fen");
        assert!(engine.is_insufficient_material());
    }

    #[test]
    fn halfmove_clock_resets_on_pawn_moves_and_captures() {
        let mut engine = ChessEngine::new();
        assert!(engine.try_move(&mv("g1f3")));
        assert!(engine.try_move(&mv("b8c6")));
        assert_eq!(engine.halfmove_clock(), 2);
        assert!(engine.try_move(&mv("e2e4")));
        assert_eq!(engine.halfmove_clock(), 0);
    }
}
