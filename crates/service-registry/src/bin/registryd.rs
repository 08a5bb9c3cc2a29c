//! Registry process: serves `/services` and runs the failure detector

use anyhow::{Context, Result};
use clap::Parser;
use service_registry::{FailureDetector, HttpTransport, Registry, RegistryConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "registryd")]
#[command(about = "Service registry - registration, heartbeats and provider updates")]
#[command(version)]
struct Cli {
    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the configuration
    #[arg(short, long)]
    listen: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => RegistryConfig::from_file(path)
            .await
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => RegistryConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen;
    }

    let transport = Arc::new(HttpTransport::new(config.heartbeat.timeout())?);
    let registry = Registry::load(config.server.snapshot_store(), transport)
        .await
        .context("Failed to load registry snapshot")?;
    let registry = Arc::new(registry);

    FailureDetector::new(registry.clone(), config.heartbeat.clone()).spawn();

    let listener = TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;

    service_registry::server::serve(listener, registry, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutting down registry service");
    })
    .await?;

    Ok(())
}
