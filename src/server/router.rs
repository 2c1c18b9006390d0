use actix_web::web;

use crate::server::api;
use crate::server::index::session::ws_queue;
use crate::server::room::session::ws_room;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/rooms").route(web::post().to(api::create_room)))
        .service(web::resource("/rooms/join-next").route(web::post().to(api::join_next)))
        .service(
            web::resource("/rooms/available-count").route(web::get().to(api::available_count)),
        )
        .service(web::resource("/queue/join").route(web::post().to(api::queue_join)))
        .service(web::resource("/queue/joinAll").route(web::post().to(api::queue_join_all)))
        .service(web::resource("/queue/leave").route(web::post().to(api::queue_leave)))
        .service(web::resource("/queue/checkMatch").route(web::post().to(api::queue_check_match)))
        .service(web::resource("/queue/heartbeat").route(web::post().to(api::queue_heartbeat)))
        .service(web::resource("/queue/status").route(web::get().to(api::queue_status)))
        .service(web::resource("/queue/ws").to(ws_queue))
        .service(web::resource("/rooms/{id}/ws").to(ws_room))
        .service(web::resource("/rooms/{id}").route(web::get().to(api::get_room)))
        .service(web::resource("/rooms/{id}/{action}").route(web::post().to(api::room_action)));
}
