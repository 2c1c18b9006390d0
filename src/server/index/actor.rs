//! The index actor: room directory and matchmaking queues.
//!
//! Single writer over two records: the `rooms` directory (metadata
//! pushed by room actors) and the per-time-control `queues`. Queue
//! mutations follow the same commit order as rooms: mutate a working
//! copy, persist, install, then notify queue subscribers.

use std::collections::{BTreeMap, HashMap};

use actix::prelude::*;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::config::matchmaking::{QUEUE_STALE_MS, TIME_CONTROLS};
use crate::server::error::ApiError;
use crate::server::index::entry::{IndexEntry, MatchDirective, QueueEntry};
use crate::server::index::estimate::{self, EstimateEntry};
use crate::server::index::messages::*;
use crate::server::index::session::QueueWsSession;
use crate::server::now_ms;
use crate::server::room::room::{Phase, PlayerRef};
use crate::server::storage::KvStore;

const ROOMS_KEY: &str = "rooms";
const QUEUES_KEY: &str = "queues";

type Queues = BTreeMap<u64, Vec<QueueEntry>>;

pub struct IndexActor {
    rooms: HashMap<String, IndexEntry>,
    queues: Queues,
    subscribers: HashMap<Uuid, Addr<QueueWsSession>>,
    store: Box<dyn KvStore>,
}

impl IndexActor {
    /// Builds the actor over its durable map, rehydrating any persisted
    /// directory and queue records.
    pub fn with_store(store: Box<dyn KvStore>) -> Self {
        let rooms = store
            .get(ROOMS_KEY)
            .ok()
            .flatten()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();
        let queues = store
            .get(QUEUES_KEY)
            .ok()
            .flatten()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();
        Self {
            rooms,
            queues,
            subscribers: HashMap::new(),
            store,
        }
    }

    fn persist_rooms(&self, rooms: &HashMap<String, IndexEntry>) -> Result<(), ApiError> {
        let record = serde_json::to_value(rooms).map_err(|_| ApiError::Internal)?;
        self.store.put(ROOMS_KEY, record).map_err(|err| {
            warn!("[Index] rooms put failed: {}", err);
            ApiError::StorageFailed
        })
    }

    fn persist_queues(&self, queues: &Queues) -> Result<(), ApiError> {
        let record = serde_json::to_value(queues).map_err(|_| ApiError::Internal)?;
        self.store.put(QUEUES_KEY, record).map_err(|err| {
            warn!("[Index] queues put failed: {}", err);
            ApiError::StorageFailed
        })
    }

    /// Drops entries whose heartbeat went silent. Returns whether
    /// anything was removed.
    fn cleanup_stale(queues: &mut Queues, now: u64) -> bool {
        let mut removed = false;
        for bucket in queues.values_mut() {
            let before = bucket.len();
            bucket.retain(|entry| now.saturating_sub(entry.last_heartbeat) <= QUEUE_STALE_MS);
            removed |= bucket.len() != before;
        }
        queues.retain(|_, bucket| !bucket.is_empty());
        removed
    }

    fn broadcast_queue_update(&mut self, now: u64) {
        self.subscribers.retain(|_, addr| addr.connected());
        if self.subscribers.is_empty() {
            return;
        }
        let text =
            serde_json::json!({ "type": "queue_update", "timestamp": now }).to_string();
        for addr in self.subscribers.values() {
            addr.do_send(QueuePush(text.clone()));
        }
    }

    fn directive_for(bucket: &[QueueEntry], time_control: u64) -> Option<MatchDirective> {
        if bucket.len() < 2 {
            return None;
        }
        Some(MatchDirective {
            main_time_ms: time_control,
            players: bucket
                .iter()
                .take(2)
                .map(|entry| PlayerRef {
                    id: entry.player_id.clone(),
                    name: entry.name.clone(),
                })
                .collect(),
        })
    }

    fn insert_waiting(bucket: &mut Vec<QueueEntry>, player_id: &str, name: &str, now: u64) -> bool {
        match bucket.iter_mut().find(|entry| entry.player_id == player_id) {
            Some(entry) => {
                entry.last_heartbeat = now;
                false
            }
            None => {
                bucket.push(QueueEntry {
                    player_id: player_id.to_string(),
                    name: name.to_string(),
                    joined_at: now,
                    last_heartbeat: now,
                });
                true
            }
        }
    }

    /// Appends the player to one bucket (FIFO). Two waiting players
    /// produce a match directive for the caller to act on.
    pub fn add_to_queue(
        &mut self,
        player_id: &str,
        name: &str,
        time_control: u64,
        now: u64,
    ) -> Result<QueueJoinOutcome, ApiError> {
        let mut queues = self.queues.clone();
        let mut changed = Self::cleanup_stale(&mut queues, now);
        let bucket = queues.entry(time_control).or_default();
        changed |= Self::insert_waiting(bucket, player_id, name, now);

        let directive = Self::directive_for(bucket, time_control);
        let position = bucket
            .iter()
            .position(|entry| entry.player_id == player_id)
            .map(|i| i + 1)
            .unwrap_or(bucket.len());

        self.persist_queues(&queues)?;
        self.queues = queues;
        if changed {
            self.broadcast_queue_update(now);
        }
        debug!(
            "[Index] queue join: player={} timeControl={} position={}",
            player_id, time_control, position
        );
        Ok(QueueJoinOutcome { directive, position })
    }

    /// Inserts the player into every supported bucket, then matches
    /// against the first bucket (in configured order) with two waiters.
    pub fn join_all(
        &mut self,
        player_id: &str,
        name: &str,
        now: u64,
    ) -> Result<QueueJoinOutcome, ApiError> {
        let mut queues = self.queues.clone();
        let mut changed = Self::cleanup_stale(&mut queues, now);
        for &time_control in TIME_CONTROLS.iter() {
            let bucket = queues.entry(time_control).or_default();
            changed |= Self::insert_waiting(bucket, player_id, name, now);
        }

        let mut directive = None;
        for &time_control in TIME_CONTROLS.iter() {
            if let Some(bucket) = queues.get(&time_control) {
                directive = Self::directive_for(bucket, time_control);
                if directive.is_some() {
                    break;
                }
            }
        }
        let position = queues
            .get(&TIME_CONTROLS[0])
            .and_then(|bucket| bucket.iter().position(|e| e.player_id == player_id))
            .map(|i| i + 1)
            .unwrap_or(1);

        self.persist_queues(&queues)?;
        self.queues = queues;
        if changed {
            self.broadcast_queue_update(now);
        }
        Ok(QueueJoinOutcome { directive, position })
    }

    pub fn remove_from_all_queues(
        &mut self,
        player_ids: &[String],
        now: u64,
    ) -> Result<(), ApiError> {
        let mut queues = self.queues.clone();
        let mut changed = false;
        for bucket in queues.values_mut() {
            let before = bucket.len();
            bucket.retain(|entry| !player_ids.contains(&entry.player_id));
            changed |= bucket.len() != before;
        }
        queues.retain(|_, bucket| !bucket.is_empty());
        if !changed {
            return Ok(());
        }
        self.persist_queues(&queues)?;
        self.queues = queues;
        self.broadcast_queue_update(now);
        Ok(())
    }

    pub fn queue_heartbeat(&mut self, player_id: &str, now: u64) -> Result<(), ApiError> {
        let mut queues = self.queues.clone();
        let mut touched = false;
        for bucket in queues.values_mut() {
            for entry in bucket.iter_mut() {
                if entry.player_id == player_id {
                    entry.last_heartbeat = now;
                    touched = true;
                }
            }
        }
        if !touched {
            return Ok(());
        }
        self.persist_queues(&queues)?;
        self.queues = queues;
        Ok(())
    }

    /// Answers from the directory: a player sitting in any listed room
    /// counts as matched.
    pub fn check_match(&self, player_id: &str) -> CheckMatchReply {
        let seated = self
            .rooms
            .values()
            .find(|entry| entry.players.iter().any(|p| p.id == player_id));
        match seated {
            Some(entry) => CheckMatchReply {
                matched: true,
                room_id: Some(entry.room_id.clone()),
                room: Some(entry.clone()),
                in_queue: false,
            },
            None => CheckMatchReply {
                matched: false,
                room_id: None,
                room: None,
                in_queue: self
                    .queues
                    .values()
                    .any(|bucket| bucket.iter().any(|e| e.player_id == player_id)),
            },
        }
    }

    pub fn queue_status(&mut self, now: u64) -> BTreeMap<String, EstimateEntry> {
        let mut queues = self.queues.clone();
        if Self::cleanup_stale(&mut queues, now) {
            match self.persist_queues(&queues) {
                Ok(()) => {
                    self.queues = queues;
                    self.broadcast_queue_update(now);
                }
                Err(_) => warn!("[Index] stale cleanup not persisted, keeping old queues"),
            }
        }
        estimate::compute(&self.rooms, &self.queues, self.store.as_ref(), now)
    }

    pub fn update_room(&mut self, entry: IndexEntry) {
        let mut rooms = self.rooms.clone();
        rooms.insert(entry.room_id.clone(), entry);
        if self.persist_rooms(&rooms).is_ok() {
            self.rooms = rooms;
        }
    }

    pub fn remove_room(&mut self, room_id: &str) {
        let mut rooms = self.rooms.clone();
        if rooms.remove(room_id).is_none() {
            return;
        }
        if self.persist_rooms(&rooms).is_ok() {
            self.rooms = rooms;
        }
    }

    pub fn list_rooms(&self) -> Vec<IndexEntry> {
        self.rooms
            .values()
            .filter(|entry| entry.phase != Phase::Finished)
            .cloned()
            .collect()
    }

    /// Forgets rooms whose owners stopped pushing updates. The room
    /// actors are the source of truth; this only trims the view.
    pub fn prune_stale_rooms(&mut self, now: u64) {
        let mut rooms = self.rooms.clone();
        let before = rooms.len();
        rooms.retain(|_, entry| {
            now.saturating_sub(entry.updated_at) <= crate::config::room::ROOM_STALE_MS
        });
        if rooms.len() == before {
            return;
        }
        if self.persist_rooms(&rooms).is_ok() {
            self.rooms = rooms;
        }
    }
}

impl Actor for IndexActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!(
            "[Index] actor started: {} rooms, {} queue buckets",
            self.rooms.len(),
            self.queues.len()
        );
    }
}

impl Handler<UpdateRoom> for IndexActor {
    type Result = ();

    fn handle(&mut self, msg: UpdateRoom, _ctx: &mut Context<Self>) -> Self::Result {
        self.update_room(msg.entry);
    }
}

impl Handler<RemoveRoom> for IndexActor {
    type Result = ();

    fn handle(&mut self, msg: RemoveRoom, _ctx: &mut Context<Self>) -> Self::Result {
        self.remove_room(&msg.room_id);
    }
}

impl Handler<ListRooms> for IndexActor {
    type Result = Result<Vec<IndexEntry>, ApiError>;

    fn handle(&mut self, _msg: ListRooms, _ctx: &mut Context<Self>) -> Self::Result {
        self.prune_stale_rooms(now_ms());
        Ok(self.list_rooms())
    }
}

impl Handler<ClearRooms> for IndexActor {
    type Result = ();

    fn handle(&mut self, _msg: ClearRooms, _ctx: &mut Context<Self>) -> Self::Result {
        self.rooms.clear();
        if let Err(err) = self.persist_rooms(&self.rooms.clone()) {
            warn!("[Index] clear not persisted: {}", err);
        }
    }
}

impl Handler<AddToQueue> for IndexActor {
    type Result = Result<QueueJoinOutcome, ApiError>;

    fn handle(&mut self, msg: AddToQueue, _ctx: &mut Context<Self>) -> Self::Result {
        self.add_to_queue(&msg.player_id, &msg.name, msg.main_time_ms, now_ms())
    }
}

impl Handler<JoinAll> for IndexActor {
    type Result = Result<QueueJoinOutcome, ApiError>;

    fn handle(&mut self, msg: JoinAll, _ctx: &mut Context<Self>) -> Self::Result {
        self.join_all(&msg.player_id, &msg.name, now_ms())
    }
}

impl Handler<RemoveFromAllQueues> for IndexActor {
    type Result = Result<(), ApiError>;

    fn handle(&mut self, msg: RemoveFromAllQueues, _ctx: &mut Context<Self>) -> Self::Result {
        self.remove_from_all_queues(&msg.player_ids, now_ms())
    }
}

impl Handler<CheckMatch> for IndexActor {
    type Result = Result<CheckMatchReply, ApiError>;

    fn handle(&mut self, msg: CheckMatch, _ctx: &mut Context<Self>) -> Self::Result {
        Ok(self.check_match(&msg.player_id))
    }
}

impl Handler<QueueHeartbeat> for IndexActor {
    type Result = Result<(), ApiError>;

    fn handle(&mut self, msg: QueueHeartbeat, _ctx: &mut Context<Self>) -> Self::Result {
        self.queue_heartbeat(&msg.player_id, now_ms())
    }
}

impl Handler<QueueStatus> for IndexActor {
    type Result = Result<BTreeMap<String, EstimateEntry>, ApiError>;

    fn handle(&mut self, _msg: QueueStatus, _ctx: &mut Context<Self>) -> Self::Result {
        let now = now_ms();
        self.prune_stale_rooms(now);
        Ok(self.queue_status(now))
    }
}

impl Handler<SubscribeQueue> for IndexActor {
    type Result = ();

    fn handle(&mut self, msg: SubscribeQueue, _ctx: &mut Context<Self>) -> Self::Result {
        self.subscribers.insert(msg.session_id, msg.addr);
    }
}

impl Handler<UnsubscribeQueue> for IndexActor {
    type Result = ();

    fn handle(&mut self, msg: UnsubscribeQueue, _ctx: &mut Context<Self>) -> Self::Result {
        self.subscribers.remove(&msg.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::SideColor;
    use crate::server::room::room::Clocks;
    use crate::server::storage::{FailStore, MemStore};

    fn index() -> IndexActor {
        IndexActor::with_store(Box::new(MemStore::new()))
    }

    fn entry(room_id: &str, phase: Phase, player_ids: &[&str]) -> IndexEntry {
        IndexEntry {
            room_id: room_id.to_string(),
            phase,
            players: player_ids
                .iter()
                .map(|id| PlayerRef {
                    id: id.to_string(),
                    name: id.to_string(),
                })
                .collect(),
            private: false,
            main_time_ms: 300_000,
            updated_at: 0,
            clocks: None,
        }
    }

    #[test]
    fn first_waiter_is_queued_second_matches() {
        let mut index = index();
        let first = index
            .add_to_queue("p1", "Alice", 600_000, 1_000)
            .expect("join");
        assert!(first.directive.is_none());
        assert_eq!(first.position, 1);

        let second = index
            .add_to_queue("p2", "Bob", 600_000, 2_000)
            .expect("join");
        let directive = second.directive.expect("match directive");
        assert_eq!(directive.main_time_ms, 600_000);
        let ids: Vec<&str> = directive.players.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[test]
    fn rejoining_refreshes_instead_of_duplicating() {
        let mut index = index();
        index.add_to_queue("p1", "Alice", 300_000, 1_000).expect("join");
        index.add_to_queue("p1", "Alice", 300_000, 5_000).expect("rejoin");
        let bucket = index.queues.get(&300_000).expect("bucket");
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket[0].last_heartbeat, 5_000);
    }

    #[test]
    fn join_all_covers_every_bucket_and_matches_first() {
        let mut index = index();
        index.add_to_queue("p1", "Alice", 600_000, 1_000).expect("join");
        let out = index.join_all("p2", "Bob", 2_000).expect("join all");
        let directive = out.directive.expect("directive");
        assert_eq!(directive.main_time_ms, 600_000);
        for time_control in TIME_CONTROLS.iter() {
            assert!(index
                .queues
                .get(time_control)
                .expect("bucket")
                .iter()
                .any(|e| e.player_id == "p2"));
        }
    }

    #[test]
    fn matched_players_leave_every_bucket() {
        let mut index = index();
        index.join_all("p1", "Alice", 1_000).expect("join all");
        index.join_all("p2", "Bob", 2_000).expect("join all");
        index
            .remove_from_all_queues(&["p1".to_string(), "p2".to_string()], 3_000)
            .expect("remove");
        assert!(index.queues.is_empty());
    }

    #[test]
    fn stale_entries_are_dropped_on_the_next_mutation() {
        let mut index = index();
        index.add_to_queue("p1", "Alice", 300_000, 1_000).expect("join");
        let later = 1_000 + QUEUE_STALE_MS + 1;
        let out = index.add_to_queue("p2", "Bob", 300_000, later).expect("join");
        assert!(out.directive.is_none(), "stale waiter must not match");
        assert_eq!(out.position, 1);
    }

    #[test]
    fn heartbeat_keeps_a_waiter_alive() {
        let mut index = index();
        index.add_to_queue("p1", "Alice", 300_000, 1_000).expect("join");
        index.queue_heartbeat("p1", 200_000).expect("heartbeat");
        let later = 200_000 + QUEUE_STALE_MS - 1;
        let out = index.add_to_queue("p2", "Bob", 300_000, later).expect("join");
        assert!(out.directive.is_some());
    }

    #[test]
    fn check_match_prefers_rooms_over_queues() {
        let mut index = index();
        index.update_room(entry("r1", Phase::Lobby, &["p1", "p2"]));
        index.add_to_queue("p3", "Carol", 300_000, 1_000).expect("join");

        let seated = index.check_match("p1");
        assert!(seated.matched);
        assert_eq!(seated.room_id.as_deref(), Some("r1"));

        let waiting = index.check_match("p3");
        assert!(!waiting.matched);
        assert!(waiting.in_queue);

        let stranger = index.check_match("p9");
        assert!(!stranger.matched);
        assert!(!stranger.in_queue);
    }

    #[test]
    fn finished_rooms_are_not_listed() {
        let mut index = index();
        index.update_room(entry("r1", Phase::Lobby, &["p1"]));
        index.update_room(entry("r2", Phase::Finished, &["p2", "p3"]));
        let listed = index.list_rooms();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].room_id, "r1");
    }

    #[test]
    fn queue_status_reports_lengths_and_games() {
        let mut index = index();
        let mut playing = entry("g1", Phase::Playing, &["p1", "p2"]);
        playing.clocks = Some(Clocks {
            white_remaining_ms: 60_000,
            black_remaining_ms: 90_000,
            last_tick_at: 0,
            turn: SideColor::White,
            frozen_at: None,
        });
        index.update_room(playing);
        index.add_to_queue("p3", "Carol", 600_000, 1_000).expect("join");

        let status = index.queue_status(2_000);
        let five = status.get("300000").expect("5 min bucket");
        assert_eq!(five.active_games, 1);
        assert_eq!(five.queue_length, 0);
        let ten = status.get("600000").expect("10 min bucket");
        assert_eq!(ten.queue_length, 1);
    }

    #[test]
    fn storage_failure_leaves_queues_untouched() {
        let mut index = IndexActor::with_store(Box::new(FailStore));
        let err = index
            .add_to_queue("p1", "Alice", 300_000, 1_000)
            .expect_err("put must fail");
        assert_eq!(err, ApiError::StorageFailed);
        assert!(index.queues.is_empty());
    }

    #[test]
    fn rehydrates_from_a_previous_store() {
        let store = MemStore::new();
        {
            let mut index = IndexActor::with_store(Box::new(MemStore::new()));
            index.add_to_queue("p1", "Alice", 300_000, 1_000).expect("join");
            let record = serde_json::to_value(&index.queues).expect("encode");
            store.put(QUEUES_KEY, record).expect("seed");
        }
        let revived = IndexActor::with_store(Box::new(store));
        assert_eq!(
            revived.queues.get(&300_000).map(|b| b.len()),
            Some(1)
        );
    }
}
