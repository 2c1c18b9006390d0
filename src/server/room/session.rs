//! WebSocket subscriber session for a room.
//!
//! The session registers with the room actor on start, delivers the
//! current snapshot as an `init` frame, then forwards every committed
//! update. Input frames are ignored apart from keepalive traffic; all
//! game commands travel over HTTP.

use std::time::{Duration, Instant};

use actix::{
    Actor, ActorContext, ActorFutureExt, AsyncContext, Addr, Handler, StreamHandler, WrapFuture,
};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::server::error::ApiError;
use crate::server::room::actor::RoomActor;
use crate::server::room::messages::{Subscribe, Unsubscribe, WsPush};
use crate::server::state::AppState;

/// Ping cadence for stale-client detection.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Missing pongs for this long close the connection.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RoomWsSession {
    session_id: Uuid,
    room_id: String,
    player_id: String,
    room_addr: Addr<RoomActor>,
    last_heartbeat: Instant,
}

impl RoomWsSession {
    pub fn new(room_id: String, player_id: String, room_addr: Addr<RoomActor>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            room_id,
            player_id,
            room_addr,
            last_heartbeat: Instant::now(),
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(
                    "[WS] room={} player={} heartbeat timeout, disconnecting",
                    act.room_id, act.player_id
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for RoomWsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(
            "[WS] room={} player={} subscriber connected",
            self.room_id, self.player_id
        );
        self.start_heartbeat(ctx);

        let subscribe = self.room_addr.send(Subscribe {
            session_id: self.session_id,
            addr: ctx.address(),
        });
        let deliver_init = subscribe.into_actor(self).then(|res, act, ctx| {
            match res {
                Ok(Ok(room)) => {
                    let frame = serde_json::json!({ "type": "init", "room": room });
                    match serde_json::to_string(&frame) {
                        Ok(text) => ctx.text(text),
                        Err(err) => {
                            warn!(
                                "[WS] room={} failed to serialize init: {}",
                                act.room_id, err
                            );
                            ctx.stop();
                        }
                    }
                }
                Ok(Err(err)) => {
                    ctx.text(format!(r#"{{"type":"error","error":"{}"}}"#, err.code()));
                    ctx.stop();
                }
                Err(_) => ctx.stop(),
            }
            actix::fut::ready(())
        });
        // Hold the mailbox until the init frame is out so updates cannot
        // overtake it.
        ctx.wait(deliver_init);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!(
            "[WS] room={} player={} subscriber disconnected",
            self.room_id, self.player_id
        );
        self.room_addr.do_send(Unsubscribe {
            session_id: self.session_id,
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RoomWsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                debug!("[WS] room={} close: {:?}", self.room_id, reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Text(_)) => {
                // Commands travel over HTTP; the stream is push-only.
                debug!("[WS] room={} ignoring inbound text", self.room_id);
            }
            Ok(other) => {
                debug!("[WS] room={} ignoring frame: {:?}", self.room_id, other);
            }
            Err(err) => {
                warn!("[WS] room={} protocol error: {:?}", self.room_id, err);
                ctx.stop();
            }
        }
    }
}

impl Handler<WsPush> for RoomWsSession {
    type Result = ();

    fn handle(&mut self, msg: WsPush, ctx: &mut Self::Context) -> Self::Result {
        ctx.text(msg.0);
    }
}

/// `GET /rooms/{id}/ws?playerId=…` — upgrades to the live stream.
pub async fn ws_room(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let room_id = req
        .match_info()
        .get("id")
        .unwrap_or_default()
        .to_string();

    let mut player_id: Option<String> = None;
    for kv in req.query_string().split('&') {
        let mut split = kv.splitn(2, '=');
        if let (Some("playerId"), Some(value)) = (split.next(), split.next()) {
            if !value.is_empty() {
                player_id = Some(value.to_string());
            }
        }
    }
    let player_id = match player_id {
        Some(id) => id,
        None => {
            warn!("[WS] upgrade refused: missing playerId for room={}", room_id);
            return Ok(ApiError::PlayerIdRequired.to_response());
        }
    };
    let room_addr = match data.registry.get(&room_id) {
        Some(addr) => addr,
        None => return Ok(ApiError::NotFound.to_response()),
    };

    ws::start(RoomWsSession::new(room_id, player_id, room_addr), &req, stream)
}
