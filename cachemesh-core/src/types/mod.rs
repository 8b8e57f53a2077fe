//! Domain types for cachemesh.
//!
//! - [`RoutableAddress`]: shared ingress address of the application
//! - [`InstanceId`]: one running instance
//! - [`PeerAddress`]: composite address used as peer identity by the cache layer
//! - [`InstanceStats`]: one instance reported by the instance-status source

mod address;
mod stats;

pub use address::*;
pub use stats::*;
