//! Messaging Module
//!
//! Data structures for one-to-one messaging:
//!
//! - `Conversation` - A two-party conversation keyed by an unordered pair
//! - `DirectMessage` - A message in a conversation
//! - `DirectEvent` / `DirectOutbound` - The direct chat socket protocol
//!
//! # Usage
//!
//! ```rust
//! use xfhub::shared::messaging::{Conversation, DirectMessage};
//! ```

pub mod conversation;
pub mod event;
pub mod message;

pub use conversation::{ordered_pair, Conversation, ConversationHistory};
pub use event::{DirectEvent, DirectOutbound};
pub use message::DirectMessage;
