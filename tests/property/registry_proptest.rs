//! Property-based tests for connection registry membership
//!
//! Random join, claim and leave sequences must keep the two indexes in
//! step: every live connection is listed under exactly the key it is filed
//! under, and empty keys disappear.

use proptest::prelude::*;
use std::collections::HashMap;
use uuid::Uuid;
use xfhub::backend::realtime::{Peer, PeerOutbox, Registry};

#[derive(Debug, Clone)]
enum Op {
    Join { peer: usize, key: u8 },
    Claim { peer: usize, key: u8 },
    Leave { peer: usize, key: u8 },
    Broadcast { key: u8 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..6usize, 0..3u8).prop_map(|(peer, key)| Op::Join { peer, key }),
        (0..6usize, 0..3u8).prop_map(|(peer, key)| Op::Claim { peer, key }),
        (0..6usize, 0..3u8).prop_map(|(peer, key)| Op::Leave { peer, key }),
        (0..3u8).prop_map(|key| Op::Broadcast { key }),
    ]
}

proptest! {
    #[test]
    fn test_membership_stays_consistent(ops in proptest::collection::vec(op(), 1..60)) {
        let registry: Registry<u8> = Registry::new();
        let connections: Vec<(Peer, PeerOutbox)> = (0..6).map(|_| Peer::channel(Uuid::new_v4(), 1024)).collect();
        let mut model: HashMap<usize, u8> = HashMap::new();

        for op in ops {
            match op {
                Op::Join { peer, key } => {
                    if connections[peer].0.is_closed() {
                        continue;
                    }
                    registry.join(key, connections[peer].0.clone());
                    model.insert(peer, key);
                }
                Op::Claim { peer, key } => {
                    if connections[peer].0.is_closed() {
                        continue;
                    }
                    registry.claim(key, connections[peer].0.clone());
                    model.retain(|_, filed| *filed != key);
                    model.insert(peer, key);
                }
                Op::Leave { peer, key } => {
                    let left = registry.leave(&key, connections[peer].0.id());
                    prop_assert_eq!(left, model.get(&peer) == Some(&key));
                    if left {
                        model.remove(&peer);
                    }
                }
                Op::Broadcast { key } => {
                    let expected = model.values().filter(|filed| **filed == key).count();
                    let delivery = registry.broadcast(&key, &"ping".into(), None);
                    prop_assert_eq!(delivery.delivered, expected);
                    prop_assert_eq!(delivery.pruned, 0);
                }
            }

            prop_assert_eq!(registry.connection_count(), model.len());
            for (index, (peer, _)) in connections.iter().enumerate() {
                prop_assert_eq!(registry.key_of(peer.id()), model.get(&index).copied());
            }
            for key in 0..3u8 {
                let members = registry.members(&key);
                let expected = model.values().filter(|filed| **filed == key).count();
                prop_assert_eq!(members.len(), expected);
            }
            let live_keys = {
                let mut keys: Vec<u8> = model.values().copied().collect();
                keys.sort();
                keys.dedup();
                keys.len()
            };
            prop_assert_eq!(registry.key_count(), live_keys);
        }
    }
}
