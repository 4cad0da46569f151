/**
 * Application State Management
 *
 * `AppState` is cloned into every handler. Everything in it is either an
 * `Arc` or a cheap handle around one, so cloning never copies data.
 *
 * The `FromRef` implementations let extractors and middleware ask for the
 * one piece they need (`State<Arc<TenantConnections<PgPool>>>`,
 * `Arc<Sessions>` for `AuthUser`) instead of the whole state.
 */
use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;

use crate::backend::auth::Sessions;
use crate::backend::chat::ChatWriters;
use crate::backend::media::{HttpMediaHook, MediaHook};
use crate::backend::realtime::{DirectHub, RoomHub};
use crate::backend::tenancy::TenantConnections;
use crate::shared::ServerConfig;

/// Per-connection limits shared by both socket endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealtimeSettings {
    /// Messages sent on connect and the default page size
    pub history_limit: i64,
    /// Frames a connection may have queued before it is dropped
    pub outbound_capacity: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub tenants: Arc<TenantConnections<PgPool>>,
    pub sessions: Arc<Sessions>,
    pub rooms: RoomHub,
    pub direct: DirectHub,
    pub writers: ChatWriters,
    pub media: Option<Arc<dyn MediaHook>>,
    pub realtime: RealtimeSettings,
    /// Bearer token of the admin routes; they are not mounted without one
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    /// Assemble the state around an already built tenant pool
    pub fn new(config: &ServerConfig, tenants: Arc<TenantConnections<PgPool>>) -> Self {
        let media = config.media_delete_url.as_ref().map(|url| {
            tracing::info!("[Media] Attachment cleanup via {}", url);
            Arc::new(HttpMediaHook::new(url.clone())) as Arc<dyn MediaHook>
        });

        Self {
            tenants,
            sessions: Arc::new(Sessions::new(&config.jwt_secret)),
            rooms: RoomHub::new(),
            direct: DirectHub::new(),
            writers: ChatWriters::new(
                config.message_batch,
                config.reaction_batch,
                config.reaction_flush_immediately,
            ),
            media,
            realtime: RealtimeSettings {
                history_limit: config.history_page_size,
                outbound_capacity: config.outbound_queue_capacity,
            },
            admin_token: config.admin_token.as_deref().map(Arc::from),
        }
    }
}

impl FromRef<AppState> for Arc<TenantConnections<PgPool>> {
    fn from_ref(state: &AppState) -> Self {
        state.tenants.clone()
    }
}

impl FromRef<AppState> for Arc<Sessions> {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for RoomHub {
    fn from_ref(state: &AppState) -> Self {
        state.rooms.clone()
    }
}

impl FromRef<AppState> for DirectHub {
    fn from_ref(state: &AppState) -> Self {
        state.direct.clone()
    }
}

impl FromRef<AppState> for ChatWriters {
    fn from_ref(state: &AppState) -> Self {
        state.writers.clone()
    }
}
