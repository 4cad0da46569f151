//! Real-time Fan-out
//!
//! - **`peer`** - Bounded per-connection outbound queue
//! - **`registry`** - Key to connections map shared by both hubs
//! - **`room_hub`** - Room chat fan-out
//! - **`direct_hub`** - One connection per user for direct messaging
//! - **`connection`** - Socket read loop and writer task

pub mod connection;
pub mod direct_hub;
pub mod peer;
pub mod registry;
pub mod room_hub;

pub use connection::{run_connection, FrameHandler};
pub use direct_hub::{DirectHub, UserKey};
pub use peer::{DeliveryError, Frame, Peer, PeerId, PeerOutbox};
pub use registry::{Delivery, Registry};
pub use room_hub::{RoomHub, RoomKey};

use serde::Serialize;

/// Serialize an outbound event into a text frame
pub fn encode<E: Serialize>(event: &E) -> Result<Frame, serde_json::Error> {
    serde_json::to_string(event).map(Frame::from)
}

/// Queue `event` on `peer` alone, closing it if the queue rejects the frame
pub fn reply<E: Serialize>(peer: &Peer, event: &E) -> Result<(), serde_json::Error> {
    let frame = encode(event)?;
    if let Err(err) = peer.send(frame) {
        tracing::warn!("[Realtime] Reply to {} failed: {}", peer.id(), err);
        peer.close();
    }
    Ok(())
}
