//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request dispatched
//!     → pool.rs (registry of backends, configured policy)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through alive backends, sticky cursor)
//!         - least_conn.rs (pick alive backend with fewest connections)
//!     → backend.rs (connection guard around the chosen backend)
//!     → transport.rs (forward over the backend's own client)
//! ```
//!
//! # Design Decisions
//! - One policy per process, chosen at startup
//! - Liveness and connection counts are per-backend atomics, no global lock
//! - Dead backends are excluded from selection
//! - Each backend owns its connection pool

use std::fmt::Debug;
use std::sync::Arc;

pub mod backend;
pub mod least_conn;
pub mod pool;
pub mod round_robin;
pub mod transport;

pub use backend::{Backend, BackendConnectionGuard};
pub use pool::BackendRegistry;
pub use transport::{HttpTransport, Transport, TransportError, TransportSettings};

/// A peer selection policy.
pub trait LoadBalancer: Send + Sync + Debug {
    /// Pick an alive backend, or `None` if every backend is dead.
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;

    /// Whether `next_server` takes a connection slot that must be released.
    fn counts_connections(&self) -> bool {
        false
    }
}
