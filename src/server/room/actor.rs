//! The room actor: single-writer owner of one room.
//!
//! Every command runs against a working copy of the state; the copy is
//! persisted, installed, pushed to the index and broadcast to live
//! subscribers in that order. A storage failure rejects the whole
//! operation with nothing applied. Index pushes are fire-and-forget: a
//! lost directory update never fails a room commit.

use std::collections::HashMap;

use actix::prelude::*;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::game::engine::ChessEngine;
use crate::server::error::ApiError;
use crate::server::index::actor::IndexActor;
use crate::server::index::entry::IndexEntry;
use crate::server::index::messages::{
    AddToQueue, RemoveFromAllQueues, RemoveRoom, UpdateRoom,
};
use crate::server::now_ms;
use crate::server::room::clock;
use crate::server::room::messages::*;
use crate::server::room::registry::RoomRegistry;
use crate::server::room::room::{PlayerRef, RematchOutcome, Room, RoomInit};
use crate::server::room::session::RoomWsSession;
use crate::server::storage::KvStore;

pub const ROOM_KEY: &str = "room";

enum EngineUpdate {
    Keep,
    Set(ChessEngine),
    Clear,
}

pub struct RoomActor {
    room: Room,
    engine: Option<ChessEngine>,
    store: Box<dyn KvStore>,
    index: Addr<IndexActor>,
    registry: RoomRegistry,
    subscribers: HashMap<Uuid, Addr<RoomWsSession>>,
}

impl RoomActor {
    pub fn new(
        room: Room,
        store: Box<dyn KvStore>,
        index: Addr<IndexActor>,
        registry: RoomRegistry,
    ) -> Self {
        Self {
            room,
            engine: None,
            store,
            index,
            registry,
            subscribers: HashMap::new(),
        }
    }

    /// The engine for the game in progress, rebuilt from the position
    /// snapshot if the in-memory one is gone.
    fn engine_for_play(&self) -> Result<ChessEngine, ApiError> {
        if let Some(engine) = &self.engine {
            return Ok(engine.clone());
        }
        match &self.room.game_fen {
            Some(fen) => ChessEngine::from_fen(fen).ok_or(ApiError::Internal),
            None => Ok(ChessEngine::new()),
        }
    }

    /// Persist-then-install. The in-memory state only changes once the
    /// durable write succeeded; broadcasts follow the commit.
    fn commit(&mut self, room: Room, engine: EngineUpdate) -> Result<(), ApiError> {
        let record = serde_json::to_value(&room).map_err(|err| {
            warn!("[Room {}] serialize failed: {}", room.room_id, err);
            ApiError::Internal
        })?;
        self.store.put(ROOM_KEY, record).map_err(|err| {
            warn!("[Room {}] durable put failed: {}", room.room_id, err);
            ApiError::StorageFailed
        })?;
        self.room = room;
        match engine {
            EngineUpdate::Keep => {}
            EngineUpdate::Set(engine) => self.engine = Some(engine),
            EngineUpdate::Clear => self.engine = None,
        }
        self.push_index();
        self.broadcast();
        Ok(())
    }

    /// Best-effort directory push; the index is a view, never a gate.
    fn push_index(&self) {
        if self.room.closed {
            self.index.do_send(RemoveRoom {
                room_id: self.room.room_id.clone(),
            });
        } else {
            self.index.do_send(UpdateRoom {
                entry: IndexEntry::from_room(&self.room),
            });
        }
    }

    fn broadcast(&mut self) {
        self.subscribers.retain(|_, addr| addr.connected());
        if self.subscribers.is_empty() {
            return;
        }
        let frame = serde_json::json!({ "type": "update", "room": &self.room });
        match serde_json::to_string(&frame) {
            Ok(text) => {
                for addr in self.subscribers.values() {
                    addr.do_send(WsPush(text.clone()));
                }
            }
            Err(err) => warn!(
                "[Room {}] failed to serialize update: {}",
                self.room.room_id, err
            ),
        }
    }

    /// Runs the lazy drivers before an operation. An expired room drops
    /// its record, leaves the directory and stops the actor.
    fn advanced(&mut self, now: u64, ctx: &mut Context<Self>) -> Result<(), ApiError> {
        let mut room = self.room.clone();
        let out = room.advance(now);
        if out.expired {
            info!("[Room {}] expired, dropping", self.room.room_id);
            if let Err(err) = self.store.delete(ROOM_KEY) {
                warn!("[Room {}] drop of record failed: {}", self.room.room_id, err);
            }
            self.index.do_send(RemoveRoom {
                room_id: self.room.room_id.clone(),
            });
            self.registry.remove(&self.room.room_id);
            ctx.stop();
            return Err(ApiError::RoomExpired);
        }
        if out.changed {
            let time_control = room.main_time_ms;
            self.commit(room, EngineUpdate::Keep)?;
            if !out.reenqueue.is_empty() {
                self.reenqueue(out.reenqueue, time_control);
            }
        }
        Ok(())
    }

    /// Hands rematch yes-voters back to the matchmaking queue, finishing
    /// any match directive the way the router would.
    fn reenqueue(&self, players: Vec<PlayerRef>, time_control: u64) {
        let index = self.index.clone();
        let registry = self.registry.clone();
        let room_id = self.room.room_id.clone();
        actix::spawn(async move {
            for player in players {
                let queued = index
                    .send(AddToQueue {
                        player_id: player.id.clone(),
                        name: player.name.clone(),
                        main_time_ms: time_control,
                    })
                    .await;
                let directive = match queued {
                    Ok(Ok(outcome)) => outcome.directive,
                    Ok(Err(err)) => {
                        warn!("[Room {}] re-enqueue of {} failed: {}", room_id, player.id, err);
                        continue;
                    }
                    Err(err) => {
                        warn!("[Room {}] index unreachable: {}", room_id, err);
                        continue;
                    }
                };
                if let Some(directive) = directive {
                    let matched: Vec<String> =
                        directive.players.iter().map(|p| p.id.clone()).collect();
                    let init = RoomInit {
                        main_time_ms: Some(directive.main_time_ms),
                        queued_players: directive.players,
                        ..RoomInit::default()
                    };
                    match registry.create_room(init) {
                        Ok(created) => {
                            debug!(
                                "[Room {}] re-enqueue matched into {}",
                                room_id, created.room_id
                            );
                            index.do_send(RemoveFromAllQueues {
                                player_ids: matched,
                            });
                        }
                        Err(err) => {
                            warn!("[Room {}] re-enqueue match failed: {}", room_id, err)
                        }
                    }
                }
            }
        });
    }
}

impl Actor for RoomActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("[Room {}] actor started", self.room.room_id);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        debug!("[Room {}] actor stopped", self.room.room_id);
    }
}

impl Handler<Join> for RoomActor {
    type Result = Result<Room, ApiError>;

    fn handle(&mut self, msg: Join, ctx: &mut Context<Self>) -> Self::Result {
        let now = now_ms();
        self.advanced(now, ctx)?;
        let mut room = self.room.clone();
        room.join(&msg.player_id, &msg.name, now)?;
        self.commit(room, EngineUpdate::Keep)?;
        Ok(self.room.clone())
    }
}

impl Handler<StartBidding> for RoomActor {
    type Result = Result<Room, ApiError>;

    fn handle(&mut self, msg: StartBidding, ctx: &mut Context<Self>) -> Self::Result {
        let now = now_ms();
        self.advanced(now, ctx)?;
        let mut room = self.room.clone();
        room.start_bidding(&msg.player_id, now)?;
        self.commit(room, EngineUpdate::Keep)?;
        Ok(self.room.clone())
    }
}

impl Handler<SubmitBid> for RoomActor {
    type Result = Result<Room, ApiError>;

    fn handle(&mut self, msg: SubmitBid, ctx: &mut Context<Self>) -> Self::Result {
        let now = now_ms();
        self.advanced(now, ctx)?;
        let mut room = self.room.clone();
        room.submit_bid(&msg.player_id, msg.amount, now)?;
        self.commit(room, EngineUpdate::Keep)?;
        Ok(self.room.clone())
    }
}

impl Handler<ChooseColor> for RoomActor {
    type Result = Result<Room, ApiError>;

    fn handle(&mut self, msg: ChooseColor, ctx: &mut Context<Self>) -> Self::Result {
        let now = now_ms();
        self.advanced(now, ctx)?;
        let mut room = self.room.clone();
        room.choose_color(&msg.player_id, msg.color, now)?;
        self.commit(room, EngineUpdate::Set(ChessEngine::new()))?;
        Ok(self.room.clone())
    }
}

impl Handler<MakeMove> for RoomActor {
    type Result = Result<Room, ApiError>;

    fn handle(&mut self, msg: MakeMove, ctx: &mut Context<Self>) -> Self::Result {
        let now = now_ms();
        self.advanced(now, ctx)?;
        let mut room = self.room.clone();
        let mut engine = self.engine_for_play()?;
        clock::apply_move(&mut room, &mut engine, &msg.player_id, &msg.mv, now)?;
        self.commit(room, EngineUpdate::Set(engine))?;
        Ok(self.room.clone())
    }
}

impl Handler<ClaimTimeForfeit> for RoomActor {
    type Result = Result<Room, ApiError>;

    fn handle(&mut self, _msg: ClaimTimeForfeit, ctx: &mut Context<Self>) -> Self::Result {
        let now = now_ms();
        self.advanced(now, ctx)?;
        let mut room = self.room.clone();
        let engine = self.engine_for_play()?;
        if clock::claim_flag(&mut room, &engine, now)? {
            self.commit(room, EngineUpdate::Keep)?;
        }
        Ok(self.room.clone())
    }
}

impl Handler<RematchVote> for RoomActor {
    type Result = Result<Room, ApiError>;

    fn handle(&mut self, msg: RematchVote, ctx: &mut Context<Self>) -> Self::Result {
        let now = now_ms();
        self.advanced(now, ctx)?;
        let mut room = self.room.clone();
        let outcome = room.rematch_vote(&msg.player_id, msg.agree, now)?;
        let time_control = room.main_time_ms;
        match outcome {
            RematchOutcome::Reset => self.commit(room, EngineUpdate::Clear)?,
            _ => self.commit(room, EngineUpdate::Keep)?,
        }
        if let RematchOutcome::Closed { reenqueue } = outcome {
            if !reenqueue.is_empty() {
                self.reenqueue(reenqueue, time_control);
            }
        }
        Ok(self.room.clone())
    }
}

impl Handler<Leave> for RoomActor {
    type Result = Result<Room, ApiError>;

    fn handle(&mut self, msg: Leave, ctx: &mut Context<Self>) -> Self::Result {
        let now = now_ms();
        self.advanced(now, ctx)?;
        let mut room = self.room.clone();
        room.leave(&msg.player_id, now);
        self.commit(room, EngineUpdate::Keep)?;
        Ok(self.room.clone())
    }
}

impl Handler<Heartbeat> for RoomActor {
    type Result = Result<Room, ApiError>;

    fn handle(&mut self, _msg: Heartbeat, ctx: &mut Context<Self>) -> Self::Result {
        let now = now_ms();
        self.advanced(now, ctx)?;
        let mut room = self.room.clone();
        room.heartbeat(now);
        self.commit(room, EngineUpdate::Keep)?;
        Ok(self.room.clone())
    }
}

impl Handler<GetState> for RoomActor {
    type Result = Result<Room, ApiError>;

    fn handle(&mut self, _msg: GetState, ctx: &mut Context<Self>) -> Self::Result {
        let now = now_ms();
        self.advanced(now, ctx)?;
        Ok(self.room.clone())
    }
}

impl Handler<Subscribe> for RoomActor {
    type Result = Result<Room, ApiError>;

    fn handle(&mut self, msg: Subscribe, ctx: &mut Context<Self>) -> Self::Result {
        let now = now_ms();
        self.advanced(now, ctx)?;
        self.subscribers.insert(msg.session_id, msg.addr);
        debug!(
            "[Room {}] subscriber attached ({} live)",
            self.room.room_id,
            self.subscribers.len()
        );
        Ok(self.room.clone())
    }
}

impl Handler<Unsubscribe> for RoomActor {
    type Result = ();

    fn handle(&mut self, msg: Unsubscribe, _ctx: &mut Context<Self>) -> Self::Result {
        self.subscribers.remove(&msg.session_id);
    }
}
