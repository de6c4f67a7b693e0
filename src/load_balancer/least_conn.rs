//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Least connections selector.
/// Selects the alive backend with the minimum number of active connections
/// and takes a connection slot on it.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        // In case of tie, the first one is selected (stability)
        let selected = backends
            .iter()
            .filter(|b| b.is_alive())
            .min_by_key(|b| b.active_connections())?;

        selected.inc_connections();
        Some(selected.clone())
    }

    fn counts_connections(&self) -> bool {
        true
    }
}
