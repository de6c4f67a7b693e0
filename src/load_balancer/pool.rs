//! Backend registry.
//!
//! # Responsibilities
//! - Hold the ordered list of backends (fixed after startup)
//! - Apply the configured load balancing policy to select backends
//! - Update liveness by backend identity
//! - Provide connection guards for tracking

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::{ConfigError, LbConfig, Policy};
use crate::config::validation::parse_backends;
use crate::load_balancer::{
    backend::{Backend, BackendConnectionGuard},
    least_conn::LeastConnections,
    round_robin::RoundRobin,
    transport::TransportSettings,
    LoadBalancer,
};

/// Ordered collection of backends plus the active selection policy.
#[derive(Debug)]
pub struct BackendRegistry {
    backends: Vec<Arc<Backend>>,
    policy: Policy,
    round_robin: RoundRobin,
    least_conn: LeastConnections,
}

impl BackendRegistry {
    /// Create an empty registry using the given policy.
    pub fn new(policy: Policy) -> Self {
        Self {
            backends: Vec::new(),
            policy,
            round_robin: RoundRobin::new(),
            least_conn: LeastConnections::new(),
        }
    }

    /// Build the registry from validated configuration.
    ///
    /// Fails if there are no backends or any of them is malformed.
    pub fn from_config(config: &LbConfig) -> Result<Self, ConfigError> {
        let urls = parse_backends(&config.backends)?;
        let settings = TransportSettings {
            connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
            idle_timeout: Duration::from_secs(config.timeouts.idle_secs),
        };

        let mut registry = Self::new(config.policy);
        for url in urls {
            tracing::info!(backend = %url, "Configured server");
            registry.register(Backend::http(url, settings));
        }
        Ok(registry)
    }

    /// Append a backend. Startup only.
    pub fn register(&mut self, backend: Backend) -> Arc<Backend> {
        let backend = Arc::new(backend);
        self.backends.push(backend.clone());
        backend
    }

    /// Set liveness of the backend with exactly this identity.
    ///
    /// Unknown identities are ignored.
    pub fn mark_status(&self, url: &Url, alive: bool) {
        if let Some(backend) = self.backends.iter().find(|b| b.url() == url) {
            backend.set_alive(alive);
        }
    }

    /// Advance the round-robin cursor, returning the scan start index.
    pub fn next_round_robin(&self) -> usize {
        self.round_robin.next_index(self.backends.len().max(1))
    }

    /// Next alive backend in rotation.
    pub fn select_round_robin(&self) -> Option<Arc<Backend>> {
        self.round_robin.next_server(&self.backends)
    }

    /// Alive backend with the fewest active connections.
    ///
    /// Its count is incremented; callers must release it with
    /// [`Backend::dec_connections`] or use [`BackendRegistry::get_peer`].
    pub fn select_least_connections(&self) -> Option<Arc<Backend>> {
        self.least_conn.next_server(&self.backends)
    }

    /// Select a backend with the configured policy.
    /// Returns a guard that releases any connection slot on drop.
    pub fn get_peer(&self) -> Option<BackendConnectionGuard> {
        let balancer: &dyn LoadBalancer = match self.policy {
            Policy::RoundRobin => &self.round_robin,
            Policy::LeastConnections => &self.least_conn,
        };

        match balancer.next_server(&self.backends) {
            Some(backend) => Some(BackendConnectionGuard::new(
                backend,
                balancer.counts_connections(),
            )),
            None => {
                tracing::debug!(backend_count = self.backends.len(), "No alive backends");
                None
            }
        }
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// All backends in registration order (for health checking).
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn alive_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_alive()).count()
    }
}
