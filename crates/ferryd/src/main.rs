//! ferryd - the ferry delivery daemon
//!
//! Loads configuration, runs crash recovery, starts one router per
//! enabled destination plus the error stash, and shuts everything down
//! on SIGINT. Exit code 0 on a clean shutdown.
//!
//! The job store behind the router is an external system in production;
//! this binary wires the in-memory store, which is enough for local
//! development and integration against real destinations.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ferry_adapters::default_registry;
use ferry_config::Config;
use ferry_jobstore::MemoryJobStore;
use ferry_router::{NoopReporter, RouterDeps, RouterManager, TopologyEvent};
use ferry_stash::ErrorStash;

#[derive(Debug, Parser)]
#[command(name = "ferryd", about = "Multi-tenant event delivery daemon", version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "ferry.toml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.log.show_target);
    if config.log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    if cli.check {
        println!("configuration ok: {}", cli.config.display());
        return Ok(());
    }

    init_tracing(&config);
    info!(
        instance = %config.instance_id,
        sources = config.sources.len(),
        destinations = config.enabled_destinations().count(),
        "ferryd starting"
    );

    let store = Arc::new(MemoryJobStore::new());
    let error_store = Arc::new(MemoryJobStore::new());

    let deps = RouterDeps {
        store: store.clone(),
        error_store: error_store.clone(),
        reporter: Arc::new(NoopReporter),
        registry: Arc::new(default_registry()),
        config: config.router.clone(),
    };

    let cancel = CancellationToken::new();

    // topology comes from the config file; the channel stays open so a
    // future config watcher can push updates without a restart
    let (topology_tx, topology_rx) = mpsc::channel(4);
    topology_tx
        .send(TopologyEvent::new(config.sources.clone()))
        .await
        .ok();

    let manager = RouterManager::new(deps);
    let manager_task = tokio::spawn(manager.run(topology_rx, cancel.child_token()));

    let transient_sources: HashSet<String> = config
        .sources
        .iter()
        .filter(|s| s.transient)
        .map(|s| s.id.clone())
        .collect();
    let stash = ErrorStash::new(
        error_store,
        config.stash.clone(),
        config.instance_id.clone(),
        transient_sources,
    )
    .context("building error stash")?;
    let stash_task = tokio::spawn(stash.run(cancel.child_token()));

    tokio::signal::ctrl_c().await.context("waiting for SIGINT")?;
    info!("shutdown signal received");

    cancel.cancel();
    drop(topology_tx);
    manager_task.await?.context("router manager failed")?;
    stash_task.await?;

    info!("ferryd stopped");
    Ok(())
}
