//! Error types for cachemesh.
//!
//! One enum covers the whole workspace. Discovery failures are contained by the
//! refresher, peer failures surface once to the cache `get` that caused them, and a
//! malformed peer address is never routed anywhere.

use thiserror::Error;

/// Result type alias using `MeshError`.
pub type Result<T> = std::result::Result<T, MeshError>;

/// Main error type for all cachemesh operations.
#[derive(Debug, Error)]
pub enum MeshError {
    // ═══════════════════════════════════════════════════════════════════════════
    // ADDRESSING ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// A peer address could not be decoded into route and instance.
    #[error("Malformed peer address: {0}")]
    MalformedAddress(String),

    /// Invalid routable address.
    #[error("Invalid routable address: {0}")]
    InvalidRoutableAddress(String),

    /// Invalid instance id.
    #[error("Invalid instance id: {0}")]
    InvalidInstanceId(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // DISCOVERY ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The instance-status source answered with a non-success status.
    #[error("Instance stats request failed with status {status}: {reason}")]
    StatsSource { status: u16, reason: String },

    /// The instance-status source did not answer within the refresh deadline.
    #[error("Instance stats request timed out after {millis}ms")]
    DiscoveryTimeout { millis: u64 },

    // ═══════════════════════════════════════════════════════════════════════════
    // PEER ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The network call to a peer failed.
    #[error("Peer '{peer}' unreachable: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    /// A peer did not answer within the transport timeout.
    #[error("Peer '{peer}' timed out after {millis}ms")]
    PeerTimeout { peer: String, millis: u64 },

    /// A peer answered with a non-success status.
    #[error("Peer '{peer}' answered with status {status}")]
    PeerStatus { peer: String, status: u16 },

    // ═══════════════════════════════════════════════════════════════════════════
    // CACHE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// No group registered under this name.
    #[error("Group not found: {0}")]
    GroupNotFound(String),

    /// The key cannot be carried as a path segment of a peer lookup.
    #[error("Invalid key: '{0}'")]
    InvalidKey(String),

    /// The local getter could not produce a value.
    #[error("Getter failed for key '{key}': {reason}")]
    GetterFailed { key: String, reason: String },

    // ═══════════════════════════════════════════════════════════════════════════
    // NETWORK & SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIGURATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl MeshError {
    /// Returns true if a later attempt may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MeshError::PeerUnreachable { .. }
                | MeshError::PeerTimeout { .. }
                | MeshError::PeerStatus { .. }
                | MeshError::StatsSource { .. }
                | MeshError::DiscoveryTimeout { .. }
                | MeshError::HttpError(_)
        )
    }

    /// Returns true if the error means the peer set itself is corrupt.
    ///
    /// Fatal errors abort the request that hit them and are never answered by a
    /// local fallback.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MeshError::MalformedAddress(_))
    }

    /// Returns true if this error came from talking to a peer.
    pub fn is_peer_error(&self) -> bool {
        matches!(
            self,
            MeshError::PeerUnreachable { .. }
                | MeshError::PeerTimeout { .. }
                | MeshError::PeerStatus { .. }
        )
    }
}
