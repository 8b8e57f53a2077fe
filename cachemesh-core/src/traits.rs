//! Capability traits for cachemesh.
//!
//! The membership refresher only talks to these two interfaces, which keeps the
//! refresh loop testable without a network or a running cache pool.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{InstanceId, InstanceStats, RoutableAddress};

// ═══════════════════════════════════════════════════════════════════════════════
// INSTANCE-STATUS SOURCE
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of the currently running instances of an application.
///
/// Any error is treated as "refresh failed this cycle" by the caller.
#[async_trait]
pub trait StatsFetcher: Send + Sync {
    /// Returns the running instances of `app_id`.
    async fn process_stats(&self, app_id: &str) -> Result<Vec<InstanceStats>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// PEER SETTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Receiver of a complete peer list.
///
/// Each call replaces the previous set wholesale. Implementations must make the
/// swap safe for concurrent readers.
pub trait PeerSetter: Send + Sync {
    /// Replaces the peer set with `route::instance` for every instance.
    fn set_peers(&self, route: &RoutableAddress, instances: &[InstanceId]);
}
