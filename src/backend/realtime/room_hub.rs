//! Room Hub
//!
//! Fans room chat events out to every connection that joined a room.
//! Rooms are scoped by tenant, so the same room id under two tenants never
//! shares connections.

use std::sync::Arc;
use uuid::Uuid;

use super::peer::{Frame, Peer, PeerId};
use super::registry::{Delivery, Registry};
use crate::shared::RoomOutbound;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoomKey {
    pub tenant_id: Uuid,
    pub room_id: Uuid,
}

impl RoomKey {
    pub fn new(tenant_id: Uuid, room_id: Uuid) -> Self {
        Self { tenant_id, room_id }
    }
}

#[derive(Clone, Default)]
pub struct RoomHub {
    registry: Arc<Registry<RoomKey>>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, room: RoomKey, peer: Peer) {
        tracing::debug!("[Realtime] {} joined room {}", peer.user_id(), room.room_id);
        self.registry.join(room, peer);
    }

    pub fn leave(&self, room: RoomKey, peer_id: PeerId) -> bool {
        self.registry.leave(&room, peer_id)
    }

    /// Send `event` to everyone in `room`
    pub fn broadcast(&self, room: RoomKey, event: &RoomOutbound) -> Delivery {
        match super::encode(event) {
            Ok(frame) => self.broadcast_frame(room, &frame),
            Err(err) => {
                tracing::error!("[Realtime] Failed to encode room event: {}", err);
                Delivery::default()
            }
        }
    }

    pub fn broadcast_frame(&self, room: RoomKey, frame: &Frame) -> Delivery {
        self.registry.broadcast(&room, frame, None)
    }

    pub fn members(&self, room: RoomKey) -> Vec<PeerId> {
        self.registry.members(&room)
    }

    pub fn room_count(&self) -> usize {
        self.registry.key_count()
    }
}
