//! Room chat WebSocket endpoint (`GET /ws/chat?token=&room_id=`)

use axum::{
    extract::{ws::WebSocket, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::db::PgMessageStore;
use super::session::RoomSession;
use crate::backend::error::BackendError;
use crate::backend::middleware::{AuthUser, TenantDb};
use crate::backend::realtime::{run_connection, Peer, PeerOutbox};
use crate::backend::server::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RoomQuery {
    #[serde(default)]
    pub room_id: Option<String>,
}

impl RoomQuery {
    pub fn room_id(&self) -> Result<Uuid, BackendError> {
        self.room_id
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .ok_or_else(|| BackendError::handler(StatusCode::BAD_REQUEST, "room_id must be a UUID"))
    }
}

/// Tenant and caller are checked before the upgrade is looked at, so a
/// bad token answers 401 rather than an upgrade error.
pub async fn room_socket(
    State(state): State<AppState>,
    TenantDb(tenant): TenantDb,
    AuthUser(user): AuthUser,
    Query(query): Query<RoomQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, BackendError> {
    let room_id = query.room_id()?;

    tracing::info!(
        "[Chat] {} connecting to room {} of tenant {}",
        user.user_id,
        room_id,
        tenant.tenant.domain
    );

    Ok(ws.on_upgrade(move |socket| async move {
        let (peer, outbox) = Peer::channel(user.user_id, state.realtime.outbound_capacity);
        let session = RoomSession {
            tenant_id: tenant.tenant.id,
            room_id,
            user,
            peer,
            hub: state.rooms.clone(),
            store: Arc::new(PgMessageStore::new(tenant.db)),
            writers: state.writers.clone(),
            media: state.media.clone(),
            history_limit: state.realtime.history_limit,
        };
        serve_room(socket, session, outbox).await;
    }))
}

/// Run a room session on an upgraded socket until either side closes
pub async fn serve_room(socket: WebSocket, session: RoomSession, outbox: PeerOutbox) {
    let room = session.room();
    session.hub.join(room, session.peer.clone());

    if let Err(err) = session.send_history().await {
        tracing::error!("[Chat] Failed to send history of room {}: {}", session.room_id, err);
    }

    run_connection(socket, session.peer.clone(), outbox, &session).await;

    session.hub.leave(room, session.peer.id());
    tracing::info!("[Chat] {} left room {}", session.user.user_id, session.room_id);
}
