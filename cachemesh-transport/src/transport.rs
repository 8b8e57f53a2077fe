//! Transport capabilities.

use async_trait::async_trait;

use cachemesh_core::error::Result;

use crate::request::PeerRequest;

/// Sends a request to a peer and returns its response.
///
/// This is the hook the cache layer calls whenever a key is owned by a remote peer.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Delivers `request` and returns the peer's response.
    async fn round_trip(&self, request: PeerRequest) -> Result<reqwest::Response>;
}

/// Plain network delegate that executes an already-routed request.
#[async_trait]
pub trait NetworkTransport: Send + Sync {
    /// Executes `request` over the network.
    async fn execute(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response>;
}

#[async_trait]
impl NetworkTransport for reqwest::Client {
    async fn execute(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        reqwest::Client::execute(self, request).await
    }
}
