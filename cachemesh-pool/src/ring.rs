//! Consistent hash ring over peer addresses.

use sha3::{Digest, Sha3_256};

use cachemesh_core::types::PeerAddress;

/// Consistent hash ring.
///
/// Every peer is placed on the ring `replicas` times. A key belongs to the first
/// point at or after its own hash, wrapping around. Points are derived from SHA3-256
/// so that all processes agree on the owner of a key.
#[derive(Clone, Debug, Default)]
pub struct PeerRing {
    replicas: usize,
    /// (point, index into `peers`), sorted
    points: Vec<(u32, usize)>,
    peers: Vec<PeerAddress>,
}

impl PeerRing {
    /// Builds a ring over `peers`.
    pub fn new(replicas: usize, peers: Vec<PeerAddress>) -> Self {
        let replicas = replicas.max(1);
        let mut points = Vec::with_capacity(replicas * peers.len());

        for (idx, peer) in peers.iter().enumerate() {
            for replica in 0..replicas {
                let point = hash_point(format!("{}{}", replica, peer.as_str()).as_bytes());
                points.push((point, idx));
            }
        }
        points.sort_unstable();

        Self {
            replicas,
            points,
            peers,
        }
    }

    /// Returns the peer owning `key`, or `None` if the ring is empty.
    pub fn get(&self, key: &str) -> Option<&PeerAddress> {
        if self.points.is_empty() {
            return None;
        }

        let hash = hash_point(key.as_bytes());
        let idx = self.points.partition_point(|(point, _)| *point < hash);
        let (_, peer_idx) = self.points[idx % self.points.len()];
        self.peers.get(peer_idx)
    }

    /// Returns the peers on the ring, in the order they were set.
    pub fn peers(&self) -> &[PeerAddress] {
        &self.peers
    }

    /// Returns the number of virtual points per peer.
    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Returns true if the ring has no peers.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

fn hash_point(data: &[u8]) -> u32 {
    let digest = Sha3_256::digest(data);
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}
