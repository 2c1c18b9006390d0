//! Records owned by the index: directory entries and queue entries.

use serde::{Deserialize, Serialize};

use crate::server::room::room::{Clocks, Phase, PlayerRef, Room};

/// Lightweight room metadata for matchmaking and discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub room_id: String,
    pub phase: Phase,
    pub players: Vec<PlayerRef>,
    pub private: bool,
    pub main_time_ms: u64,
    pub updated_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clocks: Option<Clocks>,
}

impl IndexEntry {
    pub fn from_room(room: &Room) -> Self {
        IndexEntry {
            room_id: room.room_id.clone(),
            phase: room.phase,
            players: room
                .players
                .iter()
                .map(|seat| PlayerRef {
                    id: seat.id.clone(),
                    name: seat.name.clone(),
                })
                .collect(),
            private: room.private,
            main_time_ms: room.main_time_ms,
            updated_at: room.updated_at,
            clocks: room.clocks.clone(),
        }
    }
}

/// One waiting player in a time-control bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub player_id: String,
    pub name: String,
    pub joined_at: u64,
    pub last_heartbeat: u64,
}

/// Instruction for the caller: open a room seeded with these players,
/// then remove them from every queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDirective {
    pub main_time_ms: u64,
    pub players: Vec<PlayerRef>,
}
