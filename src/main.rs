//! JSON Payload Security Gateway
//!
//! A small reverse proxy that screens requests before they reach a JSON
//! API backend.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │               PAYLOAD GATEWAY                 │
//!                    │                                               │
//!   Client Request   │  ┌───────────┐   ┌────────────┐   ┌────────┐ │
//!   ─────────────────┼─▶│ transport │──▶│  request   │──▶│forward │─┼──▶ Upstream
//!                    │  │   guard   │   │ validator  │   │        │ │    Backend
//!                    │  └───────────┘   └─────┬──────┘   └────────┘ │
//!                    │   headers/URL          │ size ceiling         │
//!                    │   no body read         │ recursive scan       │
//!                    │                        ▼                      │
//!                    │                  403 / 400 on match           │
//!                    │                                               │
//!   Client Response  │  ┌───────────────────┐                        │
//!   ◀────────────────┼──│ safe response     │◀───────────────────────┼──── Upstream
//!                    │  │ filter (optional) │                        │     Response
//!                    │  └───────────────────┘                        │
//!                    └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payload_gateway::config::{load_config, GatewayConfig};
use payload_gateway::http::HttpServer;
use payload_gateway::lifecycle::Shutdown;
use payload_gateway::security::PatternSet;

#[derive(Parser)]
#[command(name = "payload-gateway")]
#[command(about = "Security gateway for JSON APIs", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "payload_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("payload-gateway v0.1.0 starting");

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        max_depth = config.scanner.max_depth,
        max_body_bytes = config.scanner.max_body_bytes,
        "Configuration loaded"
    );

    // The registry is built exactly once and shared read-only.
    let patterns = Arc::new(PatternSet::with_extensions(
        &config.scanner.extra_keys,
        &config.scanner.extra_value_patterns,
    )?);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        address = %local_addr,
        "Listening for connections"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            payload_gateway::observability::metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, patterns);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
