//! Constants shared across cachemesh.
//!
//! The header name and the address separator are wire-level contracts with the
//! platform router and must stay stable.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// ADDRESSING
// ═══════════════════════════════════════════════════════════════════════════════

/// Separator between the routable address and the instance id in a peer address.
pub const PEER_ADDRESS_SEPARATOR: &str = "::";

/// Header read by the platform router to steer a request to one instance.
pub const INSTANCE_ROUTING_HEADER: &str = "X-CF-APP-INSTANCE";

/// Scheme prepended to routable addresses that do not carry one.
pub const DEFAULT_SCHEME: &str = "http://";

// ═══════════════════════════════════════════════════════════════════════════════
// PEER PROTOCOL
// ═══════════════════════════════════════════════════════════════════════════════

/// Path prefix where every instance mounts the peer handler.
pub const DEFAULT_BASE_PATH: &str = "/_groupcache/";

/// Virtual points per peer on the hash ring.
pub const DEFAULT_RING_REPLICAS: usize = 50;

/// Default number of entries kept by a group's local cache.
pub const DEFAULT_GROUP_CACHE_ENTRIES: usize = 10_000;

// ═══════════════════════════════════════════════════════════════════════════════
// TIMING
// ═══════════════════════════════════════════════════════════════════════════════

/// Upper bound on a single outbound peer request.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for one membership refresh.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between membership refreshes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
