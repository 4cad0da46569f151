//! Direct Messaging
//!
//! - **`db`** - `DirectStore` and its Postgres implementation
//! - **`session`** - Event dispatch for one user's connection
//! - **`socket`** - The `/ws/direct` upgrade handler

pub mod db;
pub mod session;
pub mod socket;

pub use db::{DirectStore, PgDirectStore};
pub use session::DirectSession;
pub use socket::direct_socket;
