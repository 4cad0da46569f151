//! Direct messaging WebSocket endpoint (`GET /ws/direct?token=`)

use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;

use super::db::PgDirectStore;
use super::session::DirectSession;
use crate::backend::middleware::{AuthUser, TenantDb};
use crate::backend::realtime::{run_connection, Peer, PeerOutbox};
use crate::backend::server::state::AppState;

pub async fn direct_socket(
    State(state): State<AppState>,
    TenantDb(tenant): TenantDb,
    AuthUser(user): AuthUser,
    ws: WebSocketUpgrade,
) -> Response {
    tracing::info!("[Direct] {} connecting to tenant {}", user.user_id, tenant.tenant.domain);

    ws.on_upgrade(move |socket| async move {
        let (peer, outbox) = Peer::channel(user.user_id, state.realtime.outbound_capacity);
        let session = DirectSession {
            tenant_id: tenant.tenant.id,
            user,
            peer,
            hub: state.direct.clone(),
            store: Arc::new(PgDirectStore::new(tenant.db)),
            media: state.media.clone(),
            history_limit: state.realtime.history_limit,
        };
        serve_direct(socket, session, outbox).await;
    })
}

/// Run a direct session on an upgraded socket until either side closes
pub async fn serve_direct(socket: WebSocket, session: DirectSession, outbox: PeerOutbox) {
    session.hub.register(session.tenant_id, session.peer.clone());

    if let Err(err) = session.send_history().await {
        tracing::error!("[Direct] Failed to send conversations of {}: {}", session.user.user_id, err);
    }

    run_connection(socket, session.peer.clone(), outbox, &session).await;

    session
        .hub
        .unregister(session.tenant_id, session.user.user_id, session.peer.id());
    tracing::info!("[Direct] {} disconnected", session.user.user_id);
}
