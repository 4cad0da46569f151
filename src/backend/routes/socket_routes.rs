//! WebSocket endpoints
//!
//! - `GET /ws/chat?token=&room_id=` - room chat
//! - `GET /ws/direct?token=` - direct messaging

use axum::{routing::get, Router};

use crate::backend::chat::room_socket;
use crate::backend::messaging::direct_socket;
use crate::backend::server::state::AppState;

pub fn configure_socket_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/ws/chat", get(room_socket))
        .route("/ws/direct", get(direct_socket))
}
