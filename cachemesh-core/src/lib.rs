//! # cachemesh Core
//!
//! Core types, errors, and traits shared by every cachemesh crate.
//!
//! - **Types**: routable addresses, instance ids and the composite peer address codec
//! - **Errors**: the error taxonomy for discovery and peer routing
//! - **Constants**: wire-level names and default timings
//! - **Traits**: the capabilities the membership refresher drives
//!
//! ## Example
//!
//! ```rust
//! use cachemesh_core::{InstanceId, PeerAddress, RoutableAddress};
//!
//! let route = RoutableAddress::new("svc.example.com").unwrap();
//! let instance = InstanceId::for_index("app-1", 9).unwrap();
//! let peer = PeerAddress::encode(&route, &instance);
//!
//! assert_eq!(peer.as_str(), "svc.example.com::app-1:9");
//! assert_eq!(peer.decode(), (route, instance));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

pub use constants::*;
pub use error::{MeshError, Result};
pub use traits::*;
pub use types::*;
