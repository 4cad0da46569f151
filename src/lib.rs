//! xfhub - Multi-tenant Realtime Chat Server
//!
//! Serves room chat and one-to-one direct messaging over WebSockets for
//! many tenants from one process. Each tenant is picked by the first label
//! of the request host and owns its own Postgres database, whose encrypted
//! credentials live in a shared admin database.
//!
//! # Module Structure
//!
//! - **`shared`** - Wire types, events and configuration
//!   - Room chat messages and events
//!   - Direct message conversations and events
//!   - Error and configuration types
//!
//! - **`backend`** - The server
//!   - Tenant resolution and connection pooling
//!   - Buffered writers and realtime hubs
//!   - Axum routes, middleware and startup
//!
//! # Example
//!
//! ```rust,no_run
//! use xfhub::backend::create_app;
//! use xfhub::shared::ServerConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//! let (app, _state) = create_app(&config).await?;
//! let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

/// Types shared across the backend
pub mod shared;

/// Server-side code
pub mod backend;
