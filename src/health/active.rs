//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe backends with a TCP connect
//! - Update backend liveness based on results
//! - Log up/down transitions

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use url::Url;

use crate::config::HealthCheckConfig;
use crate::load_balancer::BackendRegistry;
use crate::observability::metrics;

pub struct HealthMonitor {
    registry: Arc<BackendRegistry>,
    interval: Duration,
    timeout: Duration,
    enabled: bool,
}

impl HealthMonitor {
    pub fn new(registry: Arc<BackendRegistry>, config: &HealthCheckConfig) -> Self {
        Self {
            registry,
            interval: Duration::from_secs(config.interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
            enabled: config.enabled,
        }
    }

    /// Override the probe timeout and interval.
    pub fn with_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.interval = interval;
        self.timeout = timeout;
        self
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = ?self.interval,
            timeout = ?self.timeout,
            backends = self.registry.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; backends start out alive.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::debug!("Starting health check");
                    self.check_all().await;
                    tracing::debug!(alive = self.registry.alive_count(), "Health check completed");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend once, concurrently, and record the results.
    pub async fn check_all(&self) {
        let mut probes = JoinSet::new();

        for backend in self.registry.backends() {
            let backend = backend.clone();
            let timeout = self.timeout;
            probes.spawn(async move {
                let alive = probe(backend.url(), timeout).await;
                let was_alive = backend.is_alive();
                backend.set_alive(alive);

                match (was_alive, alive) {
                    (true, false) => tracing::warn!(backend = %backend.url(), "Backend down"),
                    (false, true) => tracing::info!(backend = %backend.url(), "Backend up"),
                    _ => tracing::debug!(
                        backend = %backend.url(),
                        status = if alive { "up" } else { "down" },
                        "Backend status unchanged"
                    ),
                }
                metrics::record_backend_health(backend.url().as_str(), alive);
            });
        }

        while let Some(result) = probes.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Health probe task failed");
            }
        }
    }
}

/// TCP connection-establishment probe bounded by `timeout`.
pub async fn probe(url: &Url, timeout: Duration) -> bool {
    let host = match url.host_str() {
        Some(h) => h,
        None => return false,
    };
    let port = url.port_or_known_default().unwrap_or(80);
    let target = format!("{}:{}", host, port);

    match time::timeout(timeout, TcpStream::connect(&target)).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            tracing::debug!(backend = %url, error = %e, "Site unreachable");
            false
        }
        Err(_) => {
            tracing::debug!(backend = %url, "Site unreachable: probe timed out");
            false
        }
    }
}
