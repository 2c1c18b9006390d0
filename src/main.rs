use actix::Actor;
use actix_web::{web, App, HttpServer};

use server::index::actor::IndexActor;
use server::room::registry::RoomRegistry;
use server::storage::MemStore;

pub mod config;
mod game;
mod server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let index_addr = IndexActor::with_store(Box::new(MemStore::new())).start();
    let registry = RoomRegistry::new(index_addr.clone());

    let state = web::Data::new(server::state::AppState::new(registry, index_addr));

    HttpServer::new(move || {
        App::new()
            .wrap(
                actix_web::middleware::DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Headers", "*")),
            )
            .app_data(state.clone())
            .configure(server::router::config)
    })
    .bind(("127.0.0.1", 8080))?
    .run()
    .await
}
