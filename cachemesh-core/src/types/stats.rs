//! Instance status types reported by the platform.

use serde::{Deserialize, Serialize};

/// One live instance as reported by the instance-status source.
///
/// Only the index is kept; the value is discarded after a single refresh cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceStats {
    /// Platform-assigned instance index
    pub index: u32,
}

impl InstanceStats {
    /// Creates stats for the given index.
    pub fn new(index: u32) -> Self {
        Self { index }
    }
}
