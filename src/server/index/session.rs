//! WebSocket session for queue-status watchers.
//!
//! Thin push-only stream: subscribes to the index on start and forwards
//! `queue_update` notifications until the client goes away.

use std::time::{Duration, Instant};

use actix::{Actor, ActorContext, AsyncContext, Handler, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::server::index::messages::{QueuePush, SubscribeQueue, UnsubscribeQueue};
use crate::server::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct QueueWsSession {
    session_id: Uuid,
    index_addr: actix::Addr<super::actor::IndexActor>,
    last_heartbeat: Instant,
}

impl Actor for QueueWsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("[WS] queue watcher {} connected", self.session_id);
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!("[WS] queue watcher {} timed out", act.session_id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
        self.index_addr.do_send(SubscribeQueue {
            session_id: self.session_id,
            addr: ctx.address(),
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        debug!("[WS] queue watcher {} disconnected", self.session_id);
        self.index_addr.do_send(UnsubscribeQueue {
            session_id: self.session_id,
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for QueueWsSession {
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
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(err) => {
                warn!("[WS] queue watcher protocol error: {:?}", err);
                ctx.stop();
            }
        }
    }
}

impl Handler<QueuePush> for QueueWsSession {
    type Result = ();

    fn handle(&mut self, msg: QueuePush, ctx: &mut Self::Context) -> Self::Result {
        ctx.text(msg.0);
    }
}

/// `GET /queue/ws` — upgrades to the queue-status stream.
pub async fn ws_queue(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    ws::start(
        QueueWsSession {
            session_id: Uuid::new_v4(),
            index_addr: data.index.clone(),
            last_heartbeat: Instant::now(),
        },
        &req,
        stream,
    )
}
