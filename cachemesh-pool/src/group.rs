//! Named cache groups.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, error, instrument, warn};

use cachemesh_core::error::Result;

use crate::peer::{check_segment, PeerPicker};

/// Loads the value of a key when this process owns it.
#[async_trait]
pub trait Getter: Send + Sync {
    /// Produces the value for `key`.
    async fn get(&self, key: &str) -> Result<Bytes>;
}

/// [`Getter`] backed by an async closure.
pub struct FnGetter<F>(F);

impl<F, Fut> FnGetter<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Bytes>> + Send,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> Getter for FnGetter<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Bytes>> + Send,
{
    async fn get(&self, key: &str) -> Result<Bytes> {
        (self.0)(key.to_string()).await
    }
}

#[derive(Default)]
struct Counters {
    gets: AtomicU64,
    cache_hits: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
    local_loads: AtomicU64,
}

/// Group statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupStats {
    /// Lookups made
    pub gets: u64,
    /// Lookups answered from the local cache
    pub cache_hits: u64,
    /// Lookups answered by the owning peer
    pub peer_loads: u64,
    /// Failed peer fetches
    pub peer_errors: u64,
    /// Values produced by the local getter
    pub local_loads: u64,
}

/// A named cache whose keys are spread over the peer pool.
///
/// A lookup is answered from the local cache, then from the peer owning the key,
/// and finally from the local getter. Failures talking to the peer fall back to the
/// getter. Any other error, such as a malformed peer address, is returned to the caller.
pub struct Group {
    name: String,
    getter: Arc<dyn Getter>,
    peers: Arc<dyn PeerPicker>,
    cache: Mutex<LruCache<String, Bytes>>,
    counters: Counters,
}

impl Group {
    /// Creates a group caching up to `capacity` locally loaded entries.
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
        getter: Arc<dyn Getter>,
        peers: Arc<dyn PeerPicker>,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name: name.into(),
            getter,
            peers,
            cache: Mutex::new(LruCache::new(capacity)),
            counters: Counters::default(),
        }
    }

    /// Returns the group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up `key`.
    ///
    /// Keys that cannot be sent to a peer (empty, `.` or `..`) are rejected on every
    /// instance, whoever owns them.
    #[instrument(skip(self), fields(group = %self.name))]
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        check_segment(key)?;
        self.counters.gets.fetch_add(1, Ordering::Relaxed);

        let cached = self.cache.lock().get(key).cloned();
        if let Some(value) = cached {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        if let Some(peer) = self.peers.pick_peer(key) {
            match peer.fetch(&self.name, key).await {
                Ok(value) => {
                    self.counters.peer_loads.fetch_add(1, Ordering::Relaxed);
                    return Ok(value);
                }
                Err(e) if e.is_peer_error() => {
                    self.counters.peer_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(peer = %peer.address(), error = %e, "Peer fetch failed, loading locally");
                }
                Err(e) => {
                    if e.is_fatal() {
                        error!(peer = %peer.address(), error = %e, "Peer address is corrupt");
                    }
                    return Err(e);
                }
            }
        }

        let value = self.getter.get(key).await?;
        self.counters.local_loads.fetch_add(1, Ordering::Relaxed);
        self.cache.lock().put(key.to_string(), value.clone());
        debug!(bytes = value.len(), "Loaded locally");

        Ok(value)
    }

    /// Returns the number of locally cached entries.
    pub fn cached_entries(&self) -> usize {
        self.cache.lock().len()
    }

    /// Returns group statistics.
    pub fn stats(&self) -> GroupStats {
        GroupStats {
            gets: self.counters.gets.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            peer_loads: self.counters.peer_loads.load(Ordering::Relaxed),
            peer_errors: self.counters.peer_errors.load(Ordering::Relaxed),
            local_loads: self.counters.local_loads.load(Ordering::Relaxed),
        }
    }
}
