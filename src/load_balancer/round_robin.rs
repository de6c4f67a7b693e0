//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Round-robin selector.
/// Stores a shared cursor to rotate through backends, skipping dead ones.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the cursor and return its new value modulo `len`.
    ///
    /// `len` must be non-zero.
    pub fn next_index(&self, len: usize) -> usize {
        let next = self.cursor.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        next % len
    }

    /// Current raw cursor value.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }

        let len = backends.len();
        let start = self.next_index(len);

        for offset in 0..len {
            let index = (start + offset) % len;
            let backend = &backends[index];
            if backend.is_alive() {
                // Sticky: later calls start from the last known-good backend.
                if offset != 0 {
                    self.cursor.store(index, Ordering::Relaxed);
                }
                return Some(backend.clone());
            }
        }
        None
    }
}
