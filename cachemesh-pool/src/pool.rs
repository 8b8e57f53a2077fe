//! The peer pool: current peer set plus the transport used to reach it.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use cachemesh_core::constants::{DEFAULT_BASE_PATH, DEFAULT_RING_REPLICAS};
use cachemesh_core::traits::PeerSetter;
use cachemesh_core::types::{InstanceId, PeerAddress, RoutableAddress};
use cachemesh_transport::{NetworkTransport, PeerTransport, RoutingTransport, TransportConfig};

use crate::peer::{HttpPeer, PeerFetcher, PeerPicker};
use crate::ring::PeerRing;

/// Peer pool configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Path prefix of the peer handler on every instance
    pub base_path: String,
    /// Virtual points per peer on the hash ring
    pub replicas: usize,
    /// Outbound transport settings
    pub transport: TransportConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.into(),
            replicas: DEFAULT_RING_REPLICAS,
            transport: TransportConfig::default(),
        }
    }
}

impl PoolConfig {
    /// Sets the peer handler path prefix.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Sets the number of virtual points per peer on the hash ring.
    pub fn with_replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas;
        self
    }

    /// Sets the outbound transport settings.
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Returns the base path with a leading and a trailing slash.
    pub fn normalized_base_path(&self) -> String {
        let trimmed = self.base_path.trim_matches('/');
        if trimmed.is_empty() {
            "/".into()
        } else {
            format!("/{}/", trimmed)
        }
    }
}

/// Set of peers sharing the cache, keyed by composite peer address.
///
/// The set is replaced wholesale by [`PeerPool::set_peers`]. Readers take a
/// snapshot of the current ring, so a swap never disturbs a lookup in flight.
pub struct PeerPool {
    self_address: PeerAddress,
    base_path: String,
    replicas: usize,
    transport: Arc<dyn PeerTransport>,
    ring: RwLock<Arc<PeerRing>>,
}

impl PeerPool {
    /// Creates a pool for this instance with default configuration.
    pub fn new(self_route: &RoutableAddress, self_instance: &InstanceId) -> Self {
        Self::with_config(self_route, self_instance, PoolConfig::default())
    }

    /// Creates a pool with custom configuration.
    ///
    /// Outbound lookups go through a [`RoutingTransport`] over a default client.
    pub fn with_config(
        self_route: &RoutableAddress,
        self_instance: &InstanceId,
        config: PoolConfig,
    ) -> Self {
        let transport = Arc::new(RoutingTransport::with_config(config.transport.clone()));
        Self::with_transport(PeerAddress::encode(self_route, self_instance), config, transport)
    }

    /// Creates a pool whose routing transport delegates to `network`.
    pub fn with_network(
        self_route: &RoutableAddress,
        self_instance: &InstanceId,
        config: PoolConfig,
        network: Arc<dyn NetworkTransport>,
    ) -> Self {
        let transport = Arc::new(RoutingTransport::with_network(
            network,
            config.transport.clone(),
        ));
        Self::with_transport(PeerAddress::encode(self_route, self_instance), config, transport)
    }

    /// Creates a pool with an arbitrary outbound transport.
    pub fn with_transport(
        self_address: PeerAddress,
        config: PoolConfig,
        transport: Arc<dyn PeerTransport>,
    ) -> Self {
        Self {
            self_address,
            base_path: config.normalized_base_path(),
            replicas: config.replicas,
            transport,
            ring: RwLock::new(Arc::new(PeerRing::new(config.replicas, Vec::new()))),
        }
    }

    /// Returns this instance's own peer address.
    pub fn self_address(&self) -> &PeerAddress {
        &self.self_address
    }

    /// Returns the peer handler path prefix.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Returns the number of virtual points per peer on the hash ring.
    pub fn replicas(&self) -> usize {
        self.ring.read().replicas()
    }

    /// Replaces the peer set with `route::instance` for every instance.
    pub fn set_peers(&self, route: &RoutableAddress, instances: &[InstanceId]) {
        let peers = instances
            .iter()
            .map(|instance| PeerAddress::encode(route, instance))
            .collect();
        self.set_peer_addresses(peers);
    }

    /// Replaces the peer set.
    pub fn set_peer_addresses(&self, peers: Vec<PeerAddress>) {
        let ring = Arc::new(PeerRing::new(self.replicas, peers));
        let count = ring.peers().len();
        *self.ring.write() = ring;
        info!(peers = count, "Peer set replaced");
    }

    /// Returns the current peer set.
    pub fn peers(&self) -> Vec<PeerAddress> {
        self.ring.read().peers().to_vec()
    }

    /// Returns the peer owning `key`, which may be this instance.
    pub fn owner(&self, key: &str) -> Option<PeerAddress> {
        let ring = self.ring.read().clone();
        ring.get(key).cloned()
    }
}

impl PeerSetter for PeerPool {
    fn set_peers(&self, route: &RoutableAddress, instances: &[InstanceId]) {
        PeerPool::set_peers(self, route, instances);
    }
}

impl PeerPicker for PeerPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>> {
        let owner = self.owner(key)?;
        if owner == self.self_address {
            return None;
        }
        Some(Arc::new(HttpPeer::new(
            owner,
            self.base_path.clone(),
            self.transport.clone(),
        )))
    }
}
