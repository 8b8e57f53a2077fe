//! Process configuration from the platform environment.

use std::time::Duration;

use serde::Deserialize;

use cachemesh_core::constants::{DEFAULT_PEER_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_REFRESH_TIMEOUT};
use cachemesh_core::error::{MeshError, Result};
use cachemesh_core::types::{InstanceId, RoutableAddress};
use cachemesh_discovery::{CapiConfig, RefresherConfig};
use cachemesh_pool::PoolConfig;
use cachemesh_transport::TransportConfig;

/// Application metadata injected by the platform as `VCAP_APPLICATION`.
#[derive(Debug, Deserialize)]
struct VcapApplication {
    #[serde(default)]
    application_uris: Vec<String>,
    application_id: String,
    cf_api: String,
}

/// Configuration of one running instance.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Address every instance is reachable through
    pub route: RoutableAddress,
    /// Platform application id
    pub app_id: String,
    /// This instance's id
    pub instance: InstanceId,
    /// Listening port
    pub port: u16,
    /// Platform API base URL
    pub api_url: String,
    /// Bearer token for the platform API
    pub api_token: Option<String>,
    /// Time between membership refreshes
    pub poll_interval: Duration,
    /// Deadline for one membership refresh, also the platform API request timeout
    pub refresh_timeout: Duration,
    /// Upper bound on one peer request
    pub peer_timeout: Duration,
}

impl AppConfig {
    /// Loads configuration from the process environment and `.env`.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw = var("VCAP_APPLICATION")
            .ok_or_else(|| MeshError::ConfigError("VCAP_APPLICATION is not set".into()))?;
        let vcap: VcapApplication = serde_json::from_str(&raw)
            .map_err(|e| MeshError::ConfigError(format!("VCAP_APPLICATION: {}", e)))?;

        let uri = vcap.application_uris.first().ok_or_else(|| {
            MeshError::ConfigError("VCAP_APPLICATION has no application_uris".into())
        })?;
        let route = RoutableAddress::new(format!("http://{}", uri))?;

        let index: u32 = required(&var, "INSTANCE_INDEX")?;
        let instance = InstanceId::for_index(&vcap.application_id, index)?;

        Ok(Self {
            route,
            instance,
            port: required(&var, "PORT")?,
            api_url: vcap.cf_api,
            api_token: var("CF_API_TOKEN").filter(|t| !t.is_empty()),
            poll_interval: seconds(&var, "CACHEMESH_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL)?,
            refresh_timeout: seconds(
                &var,
                "CACHEMESH_REFRESH_TIMEOUT_SECS",
                DEFAULT_REFRESH_TIMEOUT,
            )?,
            peer_timeout: seconds(&var, "CACHEMESH_PEER_TIMEOUT_SECS", DEFAULT_PEER_TIMEOUT)?,
            app_id: vcap.application_id,
        })
    }

    /// Peer pool configuration.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::default()
            .with_transport(TransportConfig::default().with_timeout(self.peer_timeout))
    }

    /// Refresher configuration.
    pub fn refresher_config(&self) -> RefresherConfig {
        RefresherConfig::default()
            .with_poll_interval(self.poll_interval)
            .with_refresh_timeout(self.refresh_timeout)
    }

    /// Platform API client configuration.
    pub fn capi_config(&self) -> CapiConfig {
        let config = CapiConfig::new(&self.api_url).with_timeout(self.refresh_timeout);
        match &self.api_token {
            Some(token) => config.with_token(token),
            None => config,
        }
    }
}

fn required<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<T> {
    let value = var(name).ok_or_else(|| MeshError::ConfigError(format!("{} is not set", name)))?;
    value
        .trim()
        .parse()
        .map_err(|_| MeshError::ConfigError(format!("{} is invalid: '{}'", name, value)))
}

fn seconds(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: Duration,
) -> Result<Duration> {
    match var(name) {
        Some(_) => required(var, name).map(Duration::from_secs),
        None => Ok(default),
    }
}
