mod rooms;

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::ws::SignalRelay;

#[derive(Clone)]
struct ApiState {
    relay: Arc<SignalRelay>,
}

/// Read-only HTTP views over live relay state.
pub fn router(relay: Arc<SignalRelay>) -> Router {
    Router::new()
        .route("/v1/rooms/{room_id}", get(rooms::get_room))
        .with_state(ApiState { relay })
}
