//! Shared Module
//!
//! Wire types and configuration used by every part of the backend: the
//! room chat message model, the tagged WebSocket events for room and
//! direct chat, shared error types and the server configuration.
//!
//! Everything here is plain data. Nothing in this module touches the
//! network or a database.

/// Room chat message data structures
pub mod message;

/// Room chat WebSocket events
pub mod event;

/// Shared error types
pub mod error;

/// Server configuration
pub mod config;

/// Direct messaging types
pub mod messaging;

pub use config::{ConfigError, ServerConfig, ServerConfigBuilder};
pub use error::SharedError;
pub use event::{RoomEvent, RoomOutbound};
pub use message::{Message, NewMessage, Reaction, ReactionToggle};
