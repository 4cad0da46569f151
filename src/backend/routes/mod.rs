//! Routes Module
//!
//! - **`router`** - Assembles the full router
//! - **`socket_routes`** - WebSocket endpoints
//! - **`api_routes`** - Health and tenant info
//! - **`admin_routes`** - Operator endpoints

/// Main router creation
pub mod router;

/// WebSocket endpoints
pub mod socket_routes;

/// HTTP API endpoints
pub mod api_routes;

/// Operator endpoints
pub mod admin_routes;

pub use router::create_router;
