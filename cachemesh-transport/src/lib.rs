//! # cachemesh Transport
//!
//! Outbound transport for peer requests.
//!
//! The cache layer identifies peers by composite addresses (`<route>::<instance>`).
//! [`RoutingTransport`] decodes that address, points the request at the shared
//! route and tags it with the instance-routing header so the platform router can
//! deliver it to the right instance.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod request;
mod routing;
mod transport;

pub use request::PeerRequest;
pub use routing::{RoutingTransport, TransportConfig};
pub use transport::{NetworkTransport, PeerTransport};
