//! Periodic membership refresh.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use cachemesh_core::constants::{DEFAULT_POLL_INTERVAL, DEFAULT_REFRESH_TIMEOUT};
use cachemesh_core::error::{MeshError, Result};
use cachemesh_core::traits::{PeerSetter, StatsFetcher};
use cachemesh_core::types::{InstanceId, RoutableAddress};

/// Refresher configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefresherConfig {
    /// Time between two refreshes, in milliseconds
    pub poll_interval_ms: u64,
    /// Deadline for one refresh, in milliseconds
    pub refresh_timeout_ms: u64,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            refresh_timeout_ms: DEFAULT_REFRESH_TIMEOUT.as_millis() as u64,
        }
    }
}

impl RefresherConfig {
    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Sets the per-refresh deadline.
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Returns the poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the per-refresh deadline.
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }
}

/// Refresher state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshState {
    /// Waiting for the next tick
    Idle,
    /// A stats request is in flight
    Refreshing,
}

/// Result of one refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The peer set was replaced.
    Updated {
        /// Instances handed to the peer setter
        peers: Vec<InstanceId>,
    },
    /// The peer set was left as it was.
    Failed,
}

/// Keeps a [`PeerSetter`] in step with the running instances of one application.
///
/// Each tick asks the stats source for the live instances and, on success, replaces
/// the peer set with one `route::<app_id>:<index>` entry per instance. A failed tick
/// is logged and otherwise ignored; the previous peer set stays in place until a
/// later tick succeeds.
pub struct MembershipRefresher {
    route: RoutableAddress,
    app_id: String,
    setter: Arc<dyn PeerSetter>,
    fetcher: Arc<dyn StatsFetcher>,
    config: RefresherConfig,
    refreshing: AtomicBool,
    consecutive_failures: AtomicU32,
}

impl MembershipRefresher {
    /// Creates a refresher for `app_id` reachable through `route`.
    pub fn new(
        route: RoutableAddress,
        app_id: impl Into<String>,
        setter: Arc<dyn PeerSetter>,
        fetcher: Arc<dyn StatsFetcher>,
        config: RefresherConfig,
    ) -> Self {
        Self {
            route,
            app_id: app_id.into(),
            setter,
            fetcher,
            config,
            refreshing: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> RefreshState {
        if self.refreshing.load(Ordering::Acquire) {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// Returns the number of failed ticks since the last successful one.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Returns the refresher configuration.
    pub fn config(&self) -> &RefresherConfig {
        &self.config
    }

    /// Runs one refresh bounded by `deadline`.
    #[instrument(skip(self), fields(app_id = %self.app_id))]
    pub async fn tick(&self, deadline: Duration) -> RefreshOutcome {
        let result = {
            let _refreshing = RefreshingGuard::enter(&self.refreshing);
            self.fetch_instances(deadline).await
        };

        match result {
            Ok(instances) => {
                self.setter.set_peers(&self.route, &instances);
                self.consecutive_failures.store(0, Ordering::Relaxed);
                debug!(peers = instances.len(), "Membership refreshed");
                RefreshOutcome::Updated { peers: instances }
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(error = %e, failures, "Membership refresh failed, keeping current peers");
                RefreshOutcome::Failed
            }
        }
    }

    async fn fetch_instances(&self, deadline: Duration) -> Result<Vec<InstanceId>> {
        let stats = tokio::time::timeout(deadline, self.fetcher.process_stats(&self.app_id))
            .await
            .map_err(|_| MeshError::DiscoveryTimeout {
                millis: deadline.as_millis() as u64,
            })??;

        stats
            .iter()
            .map(|s| InstanceId::for_index(&self.app_id, s.index))
            .collect()
    }

    /// Starts the refresh loop.
    ///
    /// The first refresh runs immediately. The task runs until aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.poll_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                app_id = %self.app_id,
                route = %self.route,
                interval_ms = self.config.poll_interval_ms,
                "Membership refresher started"
            );

            loop {
                interval.tick().await;
                self.tick(self.config.refresh_timeout()).await;
            }
        })
    }
}

/// Holds the refreshing flag for as long as it lives, including when a tick is dropped.
struct RefreshingGuard<'a>(&'a AtomicBool);

impl<'a> RefreshingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for RefreshingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
