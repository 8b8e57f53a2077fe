//! Address types for cachemesh.
//!
//! - [`RoutableAddress`]: the single ingress path every instance is reachable through
//! - [`InstanceId`]: identifies one running instance of the application
//! - [`PeerAddress`]: the composite `<routable>::<instance>` handed to the cache layer
//!
//! The composite form never leaves the process. The routing transport decodes it
//! before a request is sent, so the cache layer can treat peers as opaque strings
//! while the platform router still receives the instance id out of band.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::PEER_ADDRESS_SEPARATOR;
use crate::error::{MeshError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTABLE ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// The externally reachable address shared by all instances of the application.
///
/// Usually a platform-assigned hostname, optionally with scheme and port
/// (`http://my-app.example.com`). Supplied once at startup.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoutableAddress(String);

impl RoutableAddress {
    /// Creates a routable address.
    ///
    /// Fails if the value is empty, contains the peer address separator or ends
    /// with `:`.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(MeshError::InvalidRoutableAddress(
                "routable address cannot be empty".into(),
            ));
        }
        if value.contains(PEER_ADDRESS_SEPARATOR) {
            return Err(MeshError::InvalidRoutableAddress(format!(
                "'{}' contains the separator '{}'",
                value, PEER_ADDRESS_SEPARATOR
            )));
        }
        // A trailing ':' would merge into the separator.
        if value.ends_with(':') {
            return Err(MeshError::InvalidRoutableAddress(format!(
                "'{}' ends with ':'",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoutableAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoutableAddress {
    type Error = MeshError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RoutableAddress> for String {
    fn from(value: RoutableAddress) -> Self {
        value.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INSTANCE ID
// ═══════════════════════════════════════════════════════════════════════════════

/// Identifies one running instance of the application.
///
/// The platform form is `<application id>:<index>`. Indexes may be reused by a
/// restarted instance, so an id is only meaningful within one refresh cycle.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceId(String);

impl InstanceId {
    /// Creates an instance id.
    ///
    /// Fails if the value is empty, contains the peer address separator or starts
    /// with `:`.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(MeshError::InvalidInstanceId("instance id cannot be empty".into()));
        }
        if value.contains(PEER_ADDRESS_SEPARATOR) {
            return Err(MeshError::InvalidInstanceId(format!(
                "'{}' contains the separator '{}'",
                value, PEER_ADDRESS_SEPARATOR
            )));
        }
        if value.starts_with(':') {
            return Err(MeshError::InvalidInstanceId(format!(
                "'{}' starts with ':'",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Builds the id of instance `index` of application `app_id`.
    pub fn for_index(app_id: &str, index: u32) -> Result<Self> {
        Self::new(format!("{}:{}", app_id, index))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for InstanceId {
    type Error = MeshError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<InstanceId> for String {
    fn from(value: InstanceId) -> Self {
        value.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PEER ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Composite peer identity: `<routable>::<instance>`.
///
/// A `PeerAddress` always holds exactly one separator with a non-empty routable
/// part and a non-empty instance part. It can only be built by [`encode`] or by
/// parsing a string that passes [`decode`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerAddress(String);

impl PeerAddress {
    /// Encodes a routable address and an instance id.
    pub fn encode(routable: &RoutableAddress, instance: &InstanceId) -> Self {
        Self(format!(
            "{}{}{}",
            routable.as_str(),
            PEER_ADDRESS_SEPARATOR,
            instance.as_str()
        ))
    }

    /// Parses and validates a raw peer address.
    pub fn parse(raw: &str) -> Result<Self> {
        decode(raw)?;
        Ok(Self(raw.to_string()))
    }

    /// Splits the address back into its parts.
    pub fn decode(&self) -> (RoutableAddress, InstanceId) {
        let (routable, instance) = split(&self.0)
            .unwrap_or_else(|| unreachable!("PeerAddress invariant violated: {}", self.0));
        (
            RoutableAddress(routable.to_string()),
            InstanceId(instance.to_string()),
        )
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PeerAddress {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PeerAddress {
    type Error = MeshError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PeerAddress> for String {
    fn from(value: PeerAddress) -> Self {
        value.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CODEC
// ═══════════════════════════════════════════════════════════════════════════════

/// Encodes a routable address and an instance id into a peer address.
pub fn encode(routable: &RoutableAddress, instance: &InstanceId) -> PeerAddress {
    PeerAddress::encode(routable, instance)
}

/// Decodes a raw peer address into its routable address and instance id.
///
/// Splits on the first separator. Fails with [`MeshError::MalformedAddress`] when the
/// separator is missing, either half is empty, the instance half holds a second
/// separator, or the separator sits inside a longer run of colons.
pub fn decode(raw: &str) -> Result<(RoutableAddress, InstanceId)> {
    let (routable, instance) =
        split(raw).ok_or_else(|| MeshError::MalformedAddress(raw.to_string()))?;
    Ok((
        RoutableAddress(routable.to_string()),
        InstanceId(instance.to_string()),
    ))
}

fn split(raw: &str) -> Option<(&str, &str)> {
    let (routable, instance) = raw.split_once(PEER_ADDRESS_SEPARATOR)?;
    if routable.trim().is_empty() || instance.is_empty() {
        return None;
    }
    if instance.contains(PEER_ADDRESS_SEPARATOR) || instance.starts_with(':') {
        return None;
    }
    if routable.ends_with(':') {
        return None;
    }
    Some((routable, instance))
}
