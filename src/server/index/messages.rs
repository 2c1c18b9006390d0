//! Typed commands accepted by the [`IndexActor`](super::actor::IndexActor).

use std::collections::BTreeMap;

use actix::prelude::*;
use uuid::Uuid;

use crate::server::error::ApiError;
use crate::server::index::entry::{IndexEntry, MatchDirective};
use crate::server::index::estimate::EstimateEntry;
use crate::server::index::session::QueueWsSession;

/// Upsert of one room's metadata. Ignored once the room is closed.
#[derive(Message)]
#[rtype(result = "()")]
pub struct UpdateRoom {
    pub entry: IndexEntry,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct RemoveRoom {
    pub room_id: String,
}

/// All rooms that have not finished yet.
#[derive(Message)]
#[rtype(result = "Result<Vec<IndexEntry>, ApiError>")]
pub struct ListRooms;

/// Drops the whole directory. Test/admin plumbing.
#[derive(Message)]
#[rtype(result = "()")]
pub struct ClearRooms;

/// Reply to a queue insertion: the caller's position, plus a match
/// directive once two players are waiting.
#[derive(Debug)]
pub struct QueueJoinOutcome {
    pub directive: Option<MatchDirective>,
    pub position: usize,
}

#[derive(Message)]
#[rtype(result = "Result<QueueJoinOutcome, ApiError>")]
pub struct AddToQueue {
    pub player_id: String,
    pub name: String,
    pub main_time_ms: u64,
}

/// Inserts the player into every supported time-control bucket.
#[derive(Message)]
#[rtype(result = "Result<QueueJoinOutcome, ApiError>")]
pub struct JoinAll {
    pub player_id: String,
    pub name: String,
}

#[derive(Message)]
#[rtype(result = "Result<(), ApiError>")]
pub struct RemoveFromAllQueues {
    pub player_ids: Vec<String>,
}

pub struct CheckMatchReply {
    pub matched: bool,
    pub room_id: Option<String>,
    pub room: Option<IndexEntry>,
    pub in_queue: bool,
}

#[derive(Message)]
#[rtype(result = "Result<CheckMatchReply, ApiError>")]
pub struct CheckMatch {
    pub player_id: String,
}

#[derive(Message)]
#[rtype(result = "Result<(), ApiError>")]
pub struct QueueHeartbeat {
    pub player_id: String,
}

/// Wait estimates for every supported time control.
#[derive(Message)]
#[rtype(result = "Result<BTreeMap<String, EstimateEntry>, ApiError>")]
pub struct QueueStatus;

#[derive(Message)]
#[rtype(result = "()")]
pub struct SubscribeQueue {
    pub session_id: Uuid,
    pub addr: Addr<QueueWsSession>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct UnsubscribeQueue {
    pub session_id: Uuid,
}

/// Serialized frame pushed to one queue subscriber.
#[derive(Message)]
#[rtype(result = "()")]
pub struct QueuePush(pub String);
