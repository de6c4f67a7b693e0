//! simple-lb: a layer-7 HTTP load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌────────────────────────────────────────────────────┐
//!                 │                    LOAD BALANCER                    │
//!                 │                                                     │
//!  Client ───────▶│  http::server ──▶ http::dispatcher ──▶ registry     │
//!  Request        │  (axum, body       (attempts,          (round-robin │
//!                 │   buffering)        retries)            or least-   │
//!                 │                         │               conn)       │
//!                 │                         ▼                           │
//!  Client ◀───────│  http::response ◀── backend transport ◀─────────────┼──── Backend
//!  Response       │                                                     │
//!                 │  health::active: periodic TCP probes → liveness     │
//!                 │  lifecycle: SIGINT/SIGTERM → graceful shutdown      │
//!                 └────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```text
//! simple-lb --backends=http://localhost:3031,http://localhost:3032 --port=3030
//! ```

use clap::Parser;
use tokio::net::TcpListener;

use simple_lb::config::cli::Cli;
use simple_lb::lifecycle::{signals, Shutdown};
use simple_lb::observability::{logging, metrics};
use simple_lb::HttpServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config();
    let level = config
        .as_ref()
        .map(|c| c.observability.log_level.as_str())
        .unwrap_or("info");
    logging::init(level);

    tracing::info!("simple-lb v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        policy = %config.policy,
        backends = config.backends.len(),
        health_interval_secs = config.health_check.interval_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    tokio::spawn(signals::wait_for_signal(shutdown.clone()));

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
