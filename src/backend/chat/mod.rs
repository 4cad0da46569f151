//! Room Chat
//!
//! - **`db`** - `MessageStore` and its Postgres implementation
//! - **`writers`** - Per-tenant buffered writers for messages and reactions
//! - **`session`** - Event dispatch for one room connection
//! - **`socket`** - The `/ws/chat` upgrade handler

pub mod db;
pub mod session;
pub mod socket;
pub mod writers;

pub use db::{MessageStore, PgMessageStore};
pub use session::RoomSession;
pub use socket::room_socket;
pub use writers::ChatWriters;
