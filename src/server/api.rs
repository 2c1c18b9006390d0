//! HTTP handlers.
//!
//! Thin request parsing plus the composite flows that span both actor
//! kinds: queue join (index match directive → new room → dequeue) and
//! join-next (directory scan → room join). Everything else forwards to
//! the owning actor and maps its reply onto the wire shape.

use actix::MailboxError;
use actix_web::{web, HttpResponse};
use log::info;
use serde::Deserialize;
use serde_json::json;

use crate::game::types::SideColor;
use crate::server::error::ApiError;
use crate::server::index::entry::MatchDirective;
use crate::server::index::messages as index_msgs;
use crate::server::room::messages as room_msgs;
use crate::server::room::room::{Room, RoomInit};
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomBody {
    pub room_id: Option<String>,
    pub max_players: Option<usize>,
    pub bid_duration_ms: Option<u64>,
    pub choice_duration_ms: Option<u64>,
    pub main_time_ms: Option<u64>,
    pub private: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueBody {
    pub player_id: Option<String>,
    pub name: Option<String>,
    pub main_time_ms: Option<u64>,
}

/// One body shape for every room action; each action checks the fields
/// it needs.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionBody {
    pub player_id: Option<String>,
    pub name: Option<String>,
    pub amount: Option<u64>,
    pub color: Option<String>,
    #[serde(rename = "move")]
    pub mv: Option<String>,
    pub agree: Option<bool>,
}

fn default_name(player_id: &str) -> String {
    let prefix: String = player_id.chars().take(4).collect();
    format!("Player_{}", prefix)
}

fn unwrap_mailbox<T>(res: Result<T, MailboxError>) -> Result<T, ApiError> {
    res.map_err(|_| ApiError::Internal)
}

fn ok_room(room: &Room) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "ok": true, "room": room }))
}

fn room_reply(res: Result<Result<Room, ApiError>, MailboxError>) -> HttpResponse {
    match unwrap_mailbox(res).and_then(|inner| inner) {
        Ok(room) => ok_room(&room),
        Err(err) => err.to_response(),
    }
}

/// `POST /rooms` — creates an empty lobby.
pub async fn create_room(
    state: web::Data<AppState>,
    body: web::Json<CreateRoomBody>,
) -> HttpResponse {
    let body = body.into_inner();
    let init = RoomInit {
        room_id: body.room_id,
        max_players: body.max_players,
        bid_duration_ms: body.bid_duration_ms,
        choice_duration_ms: body.choice_duration_ms,
        main_time_ms: body.main_time_ms,
        private: body.private,
        ..RoomInit::default()
    };
    match state.registry.create_room(init) {
        Ok(created) => HttpResponse::Ok().json(json!({
            "ok": true,
            "roomId": created.room_id,
            "meta": crate::server::index::entry::IndexEntry::from_room(&created.room),
        })),
        Err(err) => err.to_response(),
    }
}

/// `GET /rooms/{id}` — drives lazy transitions, returns the room.
pub async fn get_room(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let room_id = path.into_inner();
    match state.registry.get(&room_id) {
        Some(addr) => room_reply(addr.send(room_msgs::GetState).await),
        None => ApiError::NotFound.to_response(),
    }
}

/// `POST /rooms/{id}/{action}` — the per-room operations of the public
/// contract.
pub async fn room_action(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<ActionBody>,
) -> HttpResponse {
    let (room_id, action) = path.into_inner();
    let addr = match state.registry.get(&room_id) {
        Some(addr) => addr,
        None => return ApiError::NotFound.to_response(),
    };
    let body = body.into_inner();
    let player_id = match body.player_id.clone() {
        Some(id) if !id.is_empty() => id,
        _ => return ApiError::PlayerIdRequired.to_response(),
    };

    match action.as_str() {
        "join" => {
            let name = body.name.unwrap_or_else(|| default_name(&player_id));
            room_reply(addr.send(room_msgs::Join { player_id, name }).await)
        }
        "start-bidding" => {
            room_reply(addr.send(room_msgs::StartBidding { player_id }).await)
        }
        "submit-bid" => {
            let amount = match body.amount {
                Some(amount) => amount,
                None => return ApiError::PlayerIdAndAmountRequired.to_response(),
            };
            room_reply(addr.send(room_msgs::SubmitBid { player_id, amount }).await)
        }
        "choose-color" => {
            let color = match body.color.as_deref() {
                Some("white") => SideColor::White,
                Some("black") => SideColor::Black,
                _ => return ApiError::InvalidColor.to_response(),
            };
            room_reply(addr.send(room_msgs::ChooseColor { player_id, color }).await)
        }
        "move" => {
            let mv = match body.mv {
                Some(mv) => mv,
                None => return ApiError::InvalidMoveFormat.to_response(),
            };
            match unwrap_mailbox(addr.send(room_msgs::MakeMove { player_id, mv }).await)
                .and_then(|inner| inner)
            {
                Ok(room) => {
                    let mut reply = json!({
                        "ok": true,
                        "room": &room,
                        "clocks": &room.clocks,
                        "moves": &room.moves,
                    });
                    if room.phase == crate::server::room::room::Phase::Finished {
                        reply["result"] = json!(&room.result);
                        reply["reason"] = json!(&room.result_reason);
                        reply["winnerId"] = json!(&room.winner_id);
                    }
                    HttpResponse::Ok().json(reply)
                }
                Err(err) => err.to_response(),
            }
        }
        "time-forfeit" => {
            room_reply(addr.send(room_msgs::ClaimTimeForfeit { player_id }).await)
        }
        "rematch" => {
            let agree = body.agree.unwrap_or(true);
            room_reply(addr.send(room_msgs::RematchVote { player_id, agree }).await)
        }
        "leave" => room_reply(addr.send(room_msgs::Leave { player_id }).await),
        "heartbeat" => room_reply(addr.send(room_msgs::Heartbeat { player_id }).await),
        _ => ApiError::NotFound.to_response(),
    }
}

/// `POST /rooms/join-next` — joins the oldest public lobby with a free
/// seat and a matching time control.
pub async fn join_next(state: web::Data<AppState>, body: web::Json<QueueBody>) -> HttpResponse {
    let body = body.into_inner();
    let player_id = match body.player_id {
        Some(id) if !id.is_empty() => id,
        _ => return ApiError::PlayerIdRequired.to_response(),
    };
    let name = body.name.unwrap_or_else(|| default_name(&player_id));

    let listed = match unwrap_mailbox(state.index.send(index_msgs::ListRooms).await)
        .and_then(|inner| inner)
    {
        Ok(listed) => listed,
        Err(err) => return err.to_response(),
    };
    let mut candidates: Vec<_> = listed
        .into_iter()
        .filter(|entry| {
            !entry.private
                && entry.phase == crate::server::room::room::Phase::Lobby
                && entry.players.len() < crate::config::room::MAX_PLAYERS
                && body
                    .main_time_ms
                    .map_or(true, |wanted| entry.main_time_ms == wanted)
        })
        .collect();
    candidates.sort_by_key(|entry| entry.updated_at);

    let target = match candidates.first() {
        Some(entry) => entry.room_id.clone(),
        None => return ApiError::NotFound.to_response(),
    };
    let addr = match state.registry.get(&target) {
        Some(addr) => addr,
        None => return ApiError::NotFound.to_response(),
    };
    match unwrap_mailbox(addr.send(room_msgs::Join { player_id, name }).await)
        .and_then(|inner| inner)
    {
        Ok(room) => HttpResponse::Ok().json(json!({
            "ok": true,
            "roomId": target,
            "room": room,
        })),
        Err(err) => err.to_response(),
    }
}

/// `GET /rooms/available-count` — public lobbies with a free seat.
pub async fn available_count(state: web::Data<AppState>) -> HttpResponse {
    match unwrap_mailbox(state.index.send(index_msgs::ListRooms).await)
        .and_then(|inner| inner)
    {
        Ok(listed) => {
            let count = listed
                .iter()
                .filter(|entry| {
                    !entry.private
                        && entry.phase == crate::server::room::room::Phase::Lobby
                        && entry.players.len() < crate::config::room::MAX_PLAYERS
                })
                .count();
            HttpResponse::Ok().json(json!({ "ok": true, "count": count }))
        }
        Err(err) => err.to_response(),
    }
}

/// Finishes a match directive: open the seeded room, clear the queues,
/// hand both players their room.
async fn settle_match(state: &web::Data<AppState>, directive: MatchDirective) -> HttpResponse {
    let matched: Vec<String> = directive.players.iter().map(|p| p.id.clone()).collect();
    let init = RoomInit {
        main_time_ms: Some(directive.main_time_ms),
        queued_players: directive.players,
        ..RoomInit::default()
    };
    match state.registry.create_room(init) {
        Ok(created) => {
            state.index.do_send(index_msgs::RemoveFromAllQueues {
                player_ids: matched,
            });
            info!("[Queue] matched into room {}", created.room_id);
            HttpResponse::Ok().json(json!({
                "ok": true,
                "roomId": created.room_id,
                "room": created.room,
            }))
        }
        Err(err) => err.to_response(),
    }
}

/// `POST /queue/join` — waits in one time-control bucket.
pub async fn queue_join(state: web::Data<AppState>, body: web::Json<QueueBody>) -> HttpResponse {
    let body = body.into_inner();
    let player_id = match body.player_id {
        Some(id) if !id.is_empty() => id,
        _ => return ApiError::PlayerIdRequired.to_response(),
    };
    let name = body.name.unwrap_or_else(|| default_name(&player_id));
    let main_time_ms = body
        .main_time_ms
        .unwrap_or(crate::config::room::DEFAULT_MAIN_TIME_MS);

    let outcome = match unwrap_mailbox(
        state
            .index
            .send(index_msgs::AddToQueue {
                player_id,
                name,
                main_time_ms,
            })
            .await,
    )
    .and_then(|inner| inner)
    {
        Ok(outcome) => outcome,
        Err(err) => return err.to_response(),
    };
    match outcome.directive {
        Some(directive) => settle_match(&state, directive).await,
        None => HttpResponse::Ok().json(json!({
            "ok": true,
            "queued": true,
            "queuePosition": outcome.position,
        })),
    }
}

/// `POST /queue/joinAll` — waits in every supported bucket at once.
pub async fn queue_join_all(
    state: web::Data<AppState>,
    body: web::Json<QueueBody>,
) -> HttpResponse {
    let body = body.into_inner();
    let player_id = match body.player_id {
        Some(id) if !id.is_empty() => id,
        _ => return ApiError::PlayerIdRequired.to_response(),
    };
    let name = body.name.unwrap_or_else(|| default_name(&player_id));

    let outcome = match unwrap_mailbox(
        state
            .index
            .send(index_msgs::JoinAll { player_id, name })
            .await,
    )
    .and_then(|inner| inner)
    {
        Ok(outcome) => outcome,
        Err(err) => return err.to_response(),
    };
    match outcome.directive {
        Some(directive) => settle_match(&state, directive).await,
        None => HttpResponse::Ok().json(json!({
            "ok": true,
            "queued": true,
            "queuePosition": outcome.position,
        })),
    }
}

/// `POST /queue/leave`
pub async fn queue_leave(state: web::Data<AppState>, body: web::Json<QueueBody>) -> HttpResponse {
    let player_id = match body.into_inner().player_id {
        Some(id) if !id.is_empty() => id,
        _ => return ApiError::PlayerIdRequired.to_response(),
    };
    match unwrap_mailbox(
        state
            .index
            .send(index_msgs::RemoveFromAllQueues {
                player_ids: vec![player_id],
            })
            .await,
    )
    .and_then(|inner| inner)
    {
        Ok(()) => HttpResponse::Ok().json(json!({ "ok": true })),
        Err(err) => err.to_response(),
    }
}

/// `POST /queue/checkMatch`
pub async fn queue_check_match(
    state: web::Data<AppState>,
    body: web::Json<QueueBody>,
) -> HttpResponse {
    let player_id = match body.into_inner().player_id {
        Some(id) if !id.is_empty() => id,
        _ => return ApiError::PlayerIdRequired.to_response(),
    };
    match unwrap_mailbox(state.index.send(index_msgs::CheckMatch { player_id }).await)
        .and_then(|inner| inner)
    {
        Ok(reply) if reply.matched => HttpResponse::Ok().json(json!({
            "ok": true,
            "matched": true,
            "roomId": reply.room_id,
            "room": reply.room,
        })),
        Ok(reply) => HttpResponse::Ok().json(json!({
            "ok": true,
            "matched": false,
            "inQueue": reply.in_queue,
        })),
        Err(err) => err.to_response(),
    }
}

/// `POST /queue/heartbeat`
pub async fn queue_heartbeat(
    state: web::Data<AppState>,
    body: web::Json<QueueBody>,
) -> HttpResponse {
    let player_id = match body.into_inner().player_id {
        Some(id) if !id.is_empty() => id,
        _ => return ApiError::PlayerIdRequired.to_response(),
    };
    match unwrap_mailbox(
        state
            .index
            .send(index_msgs::QueueHeartbeat { player_id })
            .await,
    )
    .and_then(|inner| inner)
    {
        Ok(()) => HttpResponse::Ok().json(json!({ "ok": true })),
        Err(err) => err.to_response(),
    }
}

/// `GET /queue/status`
pub async fn queue_status(state: web::Data<AppState>) -> HttpResponse {
    match unwrap_mailbox(state.index.send(index_msgs::QueueStatus).await)
        .and_then(|inner| inner)
    {
        Ok(estimates) => {
            HttpResponse::Ok().json(json!({ "ok": true, "estimates": estimates }))
        }
        Err(err) => err.to_response(),
    }
}
