//! Server Module
//!
//! - **`state`** - `AppState` and its `FromRef` implementations
//! - **`config`** - Admin database connection
//! - **`init`** - Startup wiring

/// Application state management
pub mod state;

/// Admin database loading
pub mod config;

/// Server initialization
pub mod init;

pub use init::create_app;
pub use state::{AppState, RealtimeSettings};
