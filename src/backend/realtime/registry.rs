/**
 * Connection Registry
 *
 * Maps a key (a room, a user) to the connections registered under it, in
 * registration order. A connection is filed under at most one key; joining
 * a second key moves it.
 *
 * Every mutation and every broadcast runs under the same lock, so a
 * broadcast sees either the state before or after a join or leave and
 * never half of it. Queue sends never block, which keeps the critical
 * section short. A connection whose queue rejects a frame is closed and
 * unregistered on the spot.
 */
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

use super::peer::{Frame, Peer, PeerId};

/// Outcome of one broadcast
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub pruned: usize,
}

impl Delivery {
    pub fn merge(self, other: Delivery) -> Delivery {
        Delivery {
            delivered: self.delivered + other.delivered,
            pruned: self.pruned + other.pruned,
        }
    }
}

struct Members<K> {
    by_key: HashMap<K, Vec<Peer>>,
    key_of: HashMap<PeerId, K>,
}

impl<K: Eq + Hash + Clone> Members<K> {
    fn detach(&mut self, peer_id: PeerId) -> Option<Peer> {
        let key = self.key_of.remove(&peer_id)?;
        let peers = self.by_key.get_mut(&key)?;
        let position = peers.iter().position(|peer| peer.id() == peer_id)?;
        let peer = peers.remove(position);
        if peers.is_empty() {
            self.by_key.remove(&key);
        }
        Some(peer)
    }
}

pub struct Registry<K> {
    members: Mutex<Members<K>>,
}

impl<K> Default for Registry<K> {
    fn default() -> Self {
        Self {
            members: Mutex::new(Members {
                by_key: HashMap::new(),
                key_of: HashMap::new(),
            }),
        }
    }
}

impl<K> Registry<K>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// File `peer` under `key`, after any connections already there
    pub fn join(&self, key: K, peer: Peer) {
        let mut members = self.lock();
        members.detach(peer.id());
        members.key_of.insert(peer.id(), key.clone());
        members.by_key.entry(key).or_default().push(peer);
    }

    /// Make `peer` the only connection under `key`
    ///
    /// Connections previously filed there are closed and returned.
    pub fn claim(&self, key: K, peer: Peer) -> Vec<Peer> {
        let mut members = self.lock();
        members.detach(peer.id());

        let evicted = members.by_key.insert(key.clone(), vec![peer.clone()]).unwrap_or_default();
        for old in &evicted {
            members.key_of.remove(&old.id());
            old.close();
        }
        members.key_of.insert(peer.id(), key);
        evicted
    }

    /// Remove `peer_id` from `key`; a no-op if it is filed elsewhere or gone
    pub fn leave(&self, key: &K, peer_id: PeerId) -> bool {
        let mut members = self.lock();
        if members.key_of.get(&peer_id) != Some(key) {
            return false;
        }
        members.detach(peer_id).is_some()
    }

    /// Queue `frame` on every connection under `key` except `exclude`
    pub fn broadcast(&self, key: &K, frame: &Frame, exclude: Option<PeerId>) -> Delivery {
        let mut guard = self.lock();
        let Members { by_key, key_of } = &mut *guard;

        let Some(peers) = by_key.get_mut(key) else {
            return Delivery::default();
        };

        let mut delivery = Delivery::default();
        peers.retain(|peer| {
            if Some(peer.id()) == exclude {
                return true;
            }
            match peer.send(frame.clone()) {
                Ok(()) => {
                    delivery.delivered += 1;
                    true
                }
                Err(err) => {
                    tracing::warn!("[Realtime] Dropping connection {} under {:?}: {}", peer.id(), key, err);
                    peer.close();
                    key_of.remove(&peer.id());
                    delivery.pruned += 1;
                    false
                }
            }
        });

        if peers.is_empty() {
            by_key.remove(key);
        }
        delivery
    }

    /// Connection ids under `key`, in registration order
    pub fn members(&self, key: &K) -> Vec<PeerId> {
        self.lock()
            .by_key
            .get(key)
            .map(|peers| peers.iter().map(Peer::id).collect())
            .unwrap_or_default()
    }

    /// Key `peer_id` is filed under
    pub fn key_of(&self, peer_id: PeerId) -> Option<K> {
        self.lock().key_of.get(&peer_id).cloned()
    }

    /// Number of keys with at least one connection
    pub fn key_count(&self) -> usize {
        self.lock().by_key.len()
    }

    /// Number of registered connections
    pub fn connection_count(&self) -> usize {
        self.lock().key_of.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Members<K>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
