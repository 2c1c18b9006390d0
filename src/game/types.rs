/// Types shared between the room machinery and the chess adapter.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Board side. Serialized lowercase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideColor {
    White,
    Black,
}

impl SideColor {
    pub fn opposite(self) -> Self {
        match self {
            SideColor::White => SideColor::Black,
            SideColor::Black => SideColor::White,
        }
    }
}

impl fmt::Display for SideColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideColor::White => write!(f, "white"),
            SideColor::Black => write!(f, "black"),
        }
    }
}

/// A syntactically valid coordinate move: from-square, to-square,
/// optional promotion letter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMove {
    pub from: String,
    pub to: String,
    pub promotion: Option<char>,
}

/// Validates the 4-5 char coordinate format (`e2e4`, `a7a8q`).
/// Returns `None` on anything else; legality is the engine's business.
pub fn parse_move(raw: &str) -> Option<ParsedMove> {
    let bytes = raw.as_bytes();
    if bytes.len() < 4 || bytes.len() > 5 {
        return None;
    }
    let square_ok = |f: u8, r: u8| (b'a'..=b'h').contains(&f) && (b'1'..=b'8').contains(&r);
    if !square_ok(bytes[0], bytes[1]) || !square_ok(bytes[2], bytes[3]) {
        return None;
    }
    let promotion = if bytes.len() == 5 {
        let c = bytes[4].to_ascii_lowercase() as char;
        if !matches!(c, 'q' | 'r' | 'b' | 'n') {
            return None;
        }
        Some(c)
    } else {
        None
    };
    Some(ParsedMove {
        from: raw[0..2].to_string(),
        to: raw[2..4].to_string(),
        promotion,
    })
}

/// Piece counts for one side, king excluded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Material {
    pub queens: u32,
    pub rooks: u32,
    pub pawns: u32,
    /// Bishops and knights combined.
    pub minors: u32,
}

impl Material {
    /// Whether this side can still deliver mate: any heavy piece or pawn,
    /// or at least two minor pieces.
    pub fn can_mate(&self) -> bool {
        self.queens > 0 || self.rooks > 0 || self.pawns > 0 || self.minors >= 2
    }
}
