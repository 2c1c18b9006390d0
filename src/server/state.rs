use actix::Addr;

use crate::server::index::actor::IndexActor;
use crate::server::room::registry::RoomRegistry;

pub struct AppState {
    pub registry: RoomRegistry,
    pub index: Addr<IndexActor>,
}

impl AppState {
    pub fn new(registry: RoomRegistry, index: Addr<IndexActor>) -> Self {
        AppState { registry, index }
    }
}
