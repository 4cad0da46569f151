//! Authentication Module
//!
//! Verifies the session tokens clients present when opening a socket.
//! Signup, login and user management belong to the identity service that
//! issues those tokens.

/// JWT token generation and validation
pub mod sessions;

pub use sessions::{Claims, SessionError, Sessions};
