//! Peer selection and the HTTP peer client.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;
use tracing::{debug, instrument};

use cachemesh_core::error::{MeshError, Result};
use cachemesh_core::types::PeerAddress;
use cachemesh_transport::{PeerRequest, PeerTransport};

/// Chooses the peer that owns a key.
pub trait PeerPicker: Send + Sync {
    /// Returns the owning peer, or `None` when the key belongs to this process.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>>;
}

/// Fetches a value from a remote peer.
#[async_trait]
pub trait PeerFetcher: Send + Sync {
    /// Returns the address of the peer.
    fn address(&self) -> &PeerAddress;

    /// Fetches `key` of `group` from the peer.
    async fn fetch(&self, group: &str, key: &str) -> Result<Bytes>;
}

/// Peer reached over HTTP through a [`PeerTransport`].
pub struct HttpPeer {
    address: PeerAddress,
    base_path: String,
    transport: Arc<dyn PeerTransport>,
}

impl HttpPeer {
    /// Creates a client for the peer at `address`.
    pub fn new(
        address: PeerAddress,
        base_path: impl Into<String>,
        transport: Arc<dyn PeerTransport>,
    ) -> Self {
        Self {
            address,
            base_path: base_path.into(),
            transport,
        }
    }

    /// Builds `<base_path><group>/<key>` with both segments escaped.
    pub(crate) fn lookup_path(&self, group: &str, key: &str) -> Result<String> {
        check_segment(group)?;
        check_segment(key)?;

        let mut url = Url::parse("http://peer/").map_err(|e| MeshError::HttpError(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| MeshError::HttpError("cannot build peer path".into()))?
            .clear()
            .extend(self.base_path.split('/').filter(|s| !s.is_empty()))
            .push(group)
            .push(key);
        Ok(url.path().to_string())
    }
}

/// Rejects values that do not survive as a single URL path segment.
///
/// URL normalization drops `.` and `..` segments even when percent-encoded, so such
/// a key would reach the owner without its last segment.
pub(crate) fn check_segment(segment: &str) -> Result<()> {
    match segment {
        "" | "." | ".." => Err(MeshError::InvalidKey(segment.to_string())),
        _ => Ok(()),
    }
}

#[async_trait]
impl PeerFetcher for HttpPeer {
    fn address(&self) -> &PeerAddress {
        &self.address
    }

    #[instrument(skip(self), fields(peer = %self.address))]
    async fn fetch(&self, group: &str, key: &str) -> Result<Bytes> {
        let path = self.lookup_path(group, key)?;
        let response = self
            .transport
            .round_trip(PeerRequest::get(self.address.as_str(), path))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MeshError::PeerStatus {
                peer: self.address.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| MeshError::PeerUnreachable {
                peer: self.address.to_string(),
                reason: e.to_string(),
            })?;

        debug!(bytes = body.len(), "Fetched from peer");
        Ok(body)
    }
}
