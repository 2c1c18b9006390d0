//! Typed commands accepted by a [`RoomActor`](super::actor::RoomActor).
//!
//! Every command carries the acting player and replies with the full room
//! snapshot after the mutation, or an error code.

use actix::prelude::*;
use uuid::Uuid;

use crate::game::types::SideColor;
use crate::server::error::ApiError;
use crate::server::room::room::Room;
use crate::server::room::session::RoomWsSession;

#[derive(Message)]
#[rtype(result = "Result<Room, ApiError>")]
pub struct Join {
    pub player_id: String,
    pub name: String,
}

#[derive(Message)]
#[rtype(result = "Result<Room, ApiError>")]
pub struct StartBidding {
    pub player_id: String,
}

#[derive(Message)]
#[rtype(result = "Result<Room, ApiError>")]
pub struct SubmitBid {
    pub player_id: String,
    pub amount: u64,
}

#[derive(Message)]
#[rtype(result = "Result<Room, ApiError>")]
pub struct ChooseColor {
    pub player_id: String,
    pub color: SideColor,
}

#[derive(Message)]
#[rtype(result = "Result<Room, ApiError>")]
pub struct MakeMove {
    pub player_id: String,
    pub mv: String,
}

#[derive(Message)]
#[rtype(result = "Result<Room, ApiError>")]
pub struct ClaimTimeForfeit {
    pub player_id: String,
}

#[derive(Message)]
#[rtype(result = "Result<Room, ApiError>")]
pub struct RematchVote {
    pub player_id: String,
    pub agree: bool,
}

#[derive(Message)]
#[rtype(result = "Result<Room, ApiError>")]
pub struct Leave {
    pub player_id: String,
}

#[derive(Message)]
#[rtype(result = "Result<Room, ApiError>")]
pub struct Heartbeat {
    pub player_id: String,
}

/// Drives lazy transitions, then returns the current snapshot.
#[derive(Message)]
#[rtype(result = "Result<Room, ApiError>")]
pub struct GetState;

/// Attaches a live subscriber. The reply is the snapshot the session
/// must deliver as its `init` frame.
#[derive(Message)]
#[rtype(result = "Result<Room, ApiError>")]
pub struct Subscribe {
    pub session_id: Uuid,
    pub addr: Addr<RoomWsSession>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Unsubscribe {
    pub session_id: Uuid,
}

/// Serialized frame pushed to one subscriber session.
#[derive(Message)]
#[rtype(result = "()")]
pub struct WsPush(pub String);
