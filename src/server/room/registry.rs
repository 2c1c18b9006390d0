//! Shared directory of running room actors.
//!
//! The registry is a cheap-to-clone handle: the router resolves rooms
//! through it, and room actors use it to open rematch-match rooms and to
//! drop themselves once expired.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use actix::{Actor, Addr};
use log::info;
use uuid::Uuid;

use crate::server::error::ApiError;
use crate::server::index::actor::IndexActor;
use crate::server::index::entry::IndexEntry;
use crate::server::index::messages::UpdateRoom;
use crate::server::room::actor::{RoomActor, ROOM_KEY};
use crate::server::room::room::{Room, RoomInit};
use crate::server::storage::{KvStore, MemStore};
use crate::server::now_ms;

/// A freshly created room, ready to answer requests.
pub struct CreatedRoom {
    pub room_id: String,
    pub addr: Addr<RoomActor>,
    pub room: Room,
}

#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<Mutex<HashMap<String, Addr<RoomActor>>>>,
    index: Addr<IndexActor>,
}

impl RoomRegistry {
    pub fn new(index: Addr<IndexActor>) -> Self {
        Self {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            index,
        }
    }

    pub fn get(&self, room_id: &str) -> Option<Addr<RoomActor>> {
        self.rooms
            .lock()
            .ok()
            .and_then(|rooms| rooms.get(room_id).cloned())
    }

    pub fn remove(&self, room_id: &str) {
        if let Ok(mut rooms) = self.rooms.lock() {
            rooms.remove(room_id);
        }
    }

    /// Allocates an id, persists the initial record and starts the actor.
    /// An explicit id that is already taken fails with
    /// `already_initialized`.
    pub fn create_room(&self, init: RoomInit) -> Result<CreatedRoom, ApiError> {
        let now = now_ms();
        let room_id = init
            .room_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut rooms = self.rooms.lock().map_err(|_| ApiError::Internal)?;
        if rooms.contains_key(&room_id) {
            return Err(ApiError::AlreadyInitialized);
        }

        let room = Room::new(&room_id, init, now);
        let store: Box<dyn KvStore> = Box::new(MemStore::new());
        let record = serde_json::to_value(&room).map_err(|_| ApiError::Internal)?;
        store.put(ROOM_KEY, record).map_err(|_| ApiError::StorageFailed)?;

        let addr =
            RoomActor::new(room.clone(), store, self.index.clone(), self.clone()).start();
        rooms.insert(room_id.clone(), addr.clone());
        drop(rooms);

        self.index.do_send(UpdateRoom {
            entry: IndexEntry::from_room(&room),
        });
        info!(
            "[Registry] room created: id={} players={} mainTimeMs={}",
            room_id,
            room.players.len(),
            room.main_time_ms
        );
        Ok(CreatedRoom {
            room_id,
            addr,
            room,
        })
    }
}
