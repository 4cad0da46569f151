//! Direct Hub
//!
//! Tracks the single live direct-messaging connection of each user. A
//! newer connection for the same user replaces and closes the older one.

use std::sync::Arc;
use uuid::Uuid;

use super::peer::{Frame, Peer, PeerId};
use super::registry::{Delivery, Registry};
use crate::shared::messaging::DirectOutbound;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserKey {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Clone, Default)]
pub struct DirectHub {
    registry: Arc<Registry<UserKey>>,
}

impl DirectHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `peer` the connection of its user, closing any earlier one
    pub fn register(&self, tenant_id: Uuid, peer: Peer) {
        let user_id = peer.user_id();
        let evicted = self.registry.claim(UserKey { tenant_id, user_id }, peer);
        if !evicted.is_empty() {
            tracing::info!("[Realtime] Replaced {} direct connection(s) of {}", evicted.len(), user_id);
        }
    }

    /// Drop `peer_id` if it is still the registered connection of `user_id`
    pub fn unregister(&self, tenant_id: Uuid, user_id: Uuid, peer_id: PeerId) -> bool {
        self.registry.leave(&UserKey { tenant_id, user_id }, peer_id)
    }

    pub fn is_online(&self, tenant_id: Uuid, user_id: Uuid) -> bool {
        !self.registry.members(&UserKey { tenant_id, user_id }).is_empty()
    }

    /// Send `event` to one user
    pub fn send_to(&self, tenant_id: Uuid, user_id: Uuid, event: &DirectOutbound) -> Delivery {
        self.broadcast(tenant_id, &[user_id], event, None)
    }

    /// Send `event` to each participant once, skipping connection `exclude`
    pub fn broadcast(&self, tenant_id: Uuid, participants: &[Uuid], event: &DirectOutbound, exclude: Option<PeerId>) -> Delivery {
        let frame: Frame = match super::encode(event) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::error!("[Realtime] Failed to encode direct event: {}", err);
                return Delivery::default();
            }
        };

        let mut delivery = Delivery::default();
        for (index, user_id) in participants.iter().enumerate() {
            if participants[..index].contains(user_id) {
                continue;
            }
            let key = UserKey { tenant_id, user_id: *user_id };
            delivery = delivery.merge(self.registry.broadcast(&key, &frame, exclude));
        }
        delivery
    }
}
