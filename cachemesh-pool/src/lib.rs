//! # cachemesh Pool
//!
//! Peer pool and cache groups for instances that share a single ingress route.
//!
//! - [`PeerPool`]: holds the current peer set, picks the owner of a key and sends
//!   remote lookups through the routing transport
//! - [`PeerRing`]: consistent hash ring over peer addresses
//! - [`Group`]: named cache with a local getter, filled from the owning peer
//! - [`peer_router`]: axum router answering peer lookups on the base path
//!
//! ## Example
//!
//! ```rust,ignore
//! let pool = Arc::new(PeerPool::new(&route, &self_instance));
//! let registry = Arc::new(GroupRegistry::new());
//! registry.register(Group::new("example", 1024, getter, pool.clone()))?;
//!
//! let app = peer_router(&pool, registry);
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod error;
mod group;
mod peer;
mod pool;
mod registry;
mod ring;
mod server;

pub use error::ApiError;
pub use group::{FnGetter, Getter, Group, GroupStats};
pub use peer::{HttpPeer, PeerFetcher, PeerPicker};
pub use pool::{PeerPool, PoolConfig};
pub use registry::GroupRegistry;
pub use ring::PeerRing;
pub use server::peer_router;
