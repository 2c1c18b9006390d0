//! Error codes surfaced to clients.
//!
//! Every failure is a value carried back to the HTTP/WS layer, never a
//! panic. The `code` string is the wire contract; the HTTP status is
//! derived from the kind of failure.

use actix_web::{http::StatusCode, HttpResponse};
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    // Phase errors
    #[error("room is not in the lobby phase")]
    NotInLobby,
    #[error("room is not bidding")]
    NotBidding,
    #[error("room is not picking colors")]
    NotInColorPick,
    #[error("room is not playing")]
    NotPlaying,
    #[error("room is not finished")]
    NotFinished,
    #[error("operation not valid in this phase")]
    InvalidPhase,

    // Input validation
    #[error("playerId is required")]
    PlayerIdRequired,
    #[error("playerId and amount are required")]
    PlayerIdAndAmountRequired,
    #[error("bid amount out of range")]
    InvalidBidAmount,
    #[error("color must be white or black")]
    InvalidColor,
    #[error("move must be 4-5 chars of coordinate notation")]
    InvalidMoveFormat,

    // Authorization
    #[error("it is not this player's turn to choose")]
    NotAllowedToChoose,
    #[error("it is not this player's turn")]
    NotYourTurn,
    #[error("player is not in this room")]
    UnknownPlayer,
    #[error("player has no assigned color")]
    UnknownPlayerColor,

    // Resource state
    #[error("room already initialized")]
    AlreadyInitialized,
    #[error("player already submitted a bid this round")]
    AlreadyBid,
    #[error("player already voted on the rematch")]
    AlreadyVoted,
    #[error("player already requested the start")]
    AlreadyRequested,
    #[error("room needs more players to start")]
    NeedMorePlayers,
    #[error("room is full")]
    RoomFull,
    #[error("room is closed")]
    RoomClosed,
    #[error("room expired")]
    RoomExpired,
    #[error("room is too old to join")]
    RoomTooOld,

    // Deadlines
    #[error("bidding deadline has passed")]
    BiddingClosed,
    #[error("color choice deadline has passed")]
    ChoiceDeadlinePassed,
    #[error("start request expired")]
    StartRequestExpired,
    #[error("rematch window has closed")]
    RematchWindowClosed,

    // Rules
    #[error("the engine refused the move")]
    IllegalMove,

    // Transport / infrastructure
    #[error("not found")]
    NotFound,
    #[error("durable storage failed")]
    StorageFailed,
    #[error("internal error")]
    Internal,
}

impl ApiError {
    /// Wire error code, exactly as clients match on it.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotInLobby => "not_in_lobby",
            ApiError::NotBidding => "not_bidding",
            ApiError::NotInColorPick => "not_in_color_pick",
            ApiError::NotPlaying => "not_playing",
            ApiError::NotFinished => "not_finished",
            ApiError::InvalidPhase => "invalid_phase",
            ApiError::PlayerIdRequired => "playerId_required",
            ApiError::PlayerIdAndAmountRequired => "playerId_and_amount_required",
            ApiError::InvalidBidAmount => "invalid_bid_amount",
            ApiError::InvalidColor => "invalid_color",
            ApiError::InvalidMoveFormat => "invalid_move_format",
            ApiError::NotAllowedToChoose => "not_allowed_to_choose",
            ApiError::NotYourTurn => "not_your_turn",
            ApiError::UnknownPlayer => "unknown_player",
            ApiError::UnknownPlayerColor => "unknown_player_color",
            ApiError::AlreadyInitialized => "already_initialized",
            ApiError::AlreadyBid => "already_bid",
            ApiError::AlreadyVoted => "already_voted",
            ApiError::AlreadyRequested => "already_requested",
            ApiError::NeedMorePlayers => "need_more_players",
            ApiError::RoomFull => "room_full",
            ApiError::RoomClosed => "room_closed",
            ApiError::RoomExpired => "room_expired",
            ApiError::RoomTooOld => "room_too_old",
            ApiError::BiddingClosed => "bidding_closed",
            ApiError::ChoiceDeadlinePassed => "choice_deadline_passed",
            ApiError::StartRequestExpired => "start_request_expired",
            ApiError::RematchWindowClosed => "rematch_window_closed",
            ApiError::IllegalMove => "illegal_move",
            ApiError::NotFound => "not_found",
            ApiError::StorageFailed => "storage_failed",
            ApiError::Internal => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::RoomClosed | ApiError::RoomExpired | ApiError::RoomTooOld => {
                StatusCode::GONE
            }
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::StorageFailed | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// JSON error body with the matching HTTP status.
    pub fn to_response(&self) -> HttpResponse {
        warn!("[HTTP_ERROR] code={} status={}", self.code(), self.status());
        HttpResponse::build(self.status())
            .json(serde_json::json!({ "ok": false, "error": self.code() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gone_statuses_cover_closed_and_expired() {
        assert_eq!(ApiError::RoomClosed.status(), StatusCode::GONE);
        assert_eq!(ApiError::RoomExpired.status(), StatusCode::GONE);
        assert_eq!(ApiError::RoomTooOld.status(), StatusCode::GONE);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::StorageFailed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::IllegalMove.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn codes_keep_their_wire_spelling() {
        assert_eq!(ApiError::PlayerIdRequired.code(), "playerId_required");
        assert_eq!(
            ApiError::PlayerIdAndAmountRequired.code(),
            "playerId_and_amount_required"
        );
        assert_eq!(ApiError::RoomTooOld.code(), "room_too_old");
    }
}
