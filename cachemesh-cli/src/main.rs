//! cachemesh CLI
//!
//! Runs one cache instance behind the platform router, or inspects the peer set the
//! platform currently reports.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, http::Uri, Router};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use colored::*;
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cachemesh_core::constants::DEFAULT_GROUP_CACHE_ENTRIES;
use cachemesh_core::error::MeshError;
use cachemesh_core::traits::PeerSetter;
use cachemesh_core::types::{InstanceId, PeerAddress, RoutableAddress};
use cachemesh_discovery::{CapiClient, MembershipRefresher, RefreshOutcome};
use cachemesh_pool::{ApiError, FnGetter, Getter, Group, GroupRegistry, PeerPool};

use crate::config::AppConfig;

const DEMO_GROUP: &str = "example";

/// cachemesh - shared cache for instances behind a single route
#[derive(Parser)]
#[command(name = "cachemesh")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the demo group and the peer handler
    Serve {
        /// Bind address
        #[arg(short, long, default_value = "0.0.0.0", env = "CACHEMESH_BIND")]
        bind: String,
    },

    /// Refresh membership once and print the resulting peers
    Peers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "cachemesh=debug,info"
    } else {
        "cachemesh=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Serve { bind } => cmd_serve(config, &bind).await,
        Commands::Peers => cmd_peers(config).await,
    }
}

/// Getter for the demo group: a random value per key.
fn demo_getter() -> Arc<dyn Getter> {
    Arc::new(FnGetter::new(|_key: String| async move {
        Ok::<_, MeshError>(Bytes::from(rand::random::<u64>().to_string()))
    }))
}

/// Demo key for a request path: decoded, with every '/' removed.
fn key_from_path(path: &str) -> String {
    percent_decode_str(path)
        .decode_utf8_lossy()
        .replace('/', "")
}

async fn get_key(State(group): State<Arc<Group>>, uri: Uri) -> Result<Bytes, ApiError> {
    Ok(group.get(&key_from_path(uri.path())).await?)
}

/// Serve the demo group
async fn cmd_serve(config: AppConfig, bind: &str) -> Result<()> {
    println!("{}", "Starting cachemesh instance...".cyan().bold());
    println!("   {} {}", "Route:".green(), config.route);
    println!("   {} {}", "Instance:".green(), config.instance);

    let pool = Arc::new(PeerPool::with_config(
        &config.route,
        &config.instance,
        config.pool_config(),
    ));

    let registry = Arc::new(GroupRegistry::new());
    let group = registry.register(Group::new(
        DEMO_GROUP,
        DEFAULT_GROUP_CACHE_ENTRIES,
        demo_getter(),
        pool.clone(),
    ))?;

    let stats = CapiClient::with_config(config.capi_config())?;
    let refresher = Arc::new(MembershipRefresher::new(
        config.route.clone(),
        config.app_id.clone(),
        pool.clone(),
        Arc::new(stats),
        config.refresher_config(),
    ));
    let refresh_task = refresher.spawn();

    let app = pool
        .router(registry)
        .merge(Router::new().fallback(get_key).with_state(group));

    let addr: SocketAddr = format!("{}:{}", bind, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");
    println!("   {} http://{}\n", "Listening on:".green(), addr);

    let served = axum::serve(listener, app).await;
    refresh_task.abort();
    served?;

    Ok(())
}

/// Collects the peers a refresh would install.
#[derive(Default)]
struct PeerCollector {
    peers: Mutex<Vec<PeerAddress>>,
}

impl PeerSetter for PeerCollector {
    fn set_peers(&self, route: &RoutableAddress, instances: &[InstanceId]) {
        *self.peers.lock() = instances
            .iter()
            .map(|instance| PeerAddress::encode(route, instance))
            .collect();
    }
}

/// Refresh membership once
async fn cmd_peers(config: AppConfig) -> Result<()> {
    println!("{} {}", "Refreshing peers for".cyan().bold(), config.app_id);

    let collector = Arc::new(PeerCollector::default());
    let stats = CapiClient::with_config(config.capi_config())?;
    let refresher = MembershipRefresher::new(
        config.route.clone(),
        config.app_id.clone(),
        collector.clone(),
        Arc::new(stats),
        config.refresher_config(),
    );

    match refresher.tick(config.refresh_timeout).await {
        RefreshOutcome::Updated { .. } => {
            let peers = collector.peers.lock();
            println!("   {} {}", "Peers:".green(), peers.len());
            for peer in peers.iter() {
                let marker = if peer == &PeerAddress::encode(&config.route, &config.instance) {
                    " (self)".dimmed().to_string()
                } else {
                    String::new()
                };
                println!("   {}{}", peer, marker);
            }
            Ok(())
        }
        RefreshOutcome::Failed => anyhow::bail!("membership refresh failed, see log for details"),
    }
}
