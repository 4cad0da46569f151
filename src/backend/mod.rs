//! Backend Module
//!
//! Server-side code: tenant resolution, the realtime hubs, the chat and
//! direct-message sessions, and the Axum server that ties them together.
//!
//! # Architecture
//!
//! - **`tenancy`** - Credential vault, tenant directory cache, per-tenant connection pool
//! - **`buffer`** - Generic buffered batch writer and per-tenant writer pool
//! - **`realtime`** - Per-connection queues, connection registry, room and direct hubs
//! - **`chat`** - Room chat store, writers and sessions
//! - **`messaging`** - Direct message store and sessions
//! - **`media`** - Attachment cleanup hook
//! - **`auth`** - Session token verification
//! - **`middleware`** - Tenant resolution and authentication extractors
//! - **`routes`** - Route configuration
//! - **`server`** - Application state and startup
//! - **`error`** - Backend error types
//!
//! # Request Flow
//!
//! ```text
//! request ─► tenant_middleware ─► TenantContext { tenant, db }
//!                                       │
//!         /ws/chat ─► RoomSession ──────┼─► RoomHub ─► peers
//!                         └─► ChatWriters ─► tenant db
//!         /ws/direct ─► DirectSession ──┴─► DirectHub ─► peer
//! ```

/// Tenant metadata, credentials and connections
pub mod tenancy;

/// Buffered batch persistence
pub mod buffer;

/// Real-time fan-out
pub mod realtime;

/// Room chat
pub mod chat;

/// Direct messaging
pub mod messaging;

/// Attachment cleanup
pub mod media;

/// Session tokens
pub mod auth;

/// Middleware for request processing
pub mod middleware;

/// Route configuration
pub mod routes;

/// Server setup and configuration
pub mod server;

/// Backend error types
pub mod error;

pub use error::{BackendError, StoreError};
pub use server::{create_app, AppState};
