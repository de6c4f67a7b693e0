//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → TCP connect probe to each backend (concurrent, bounded timeout)
//!     → Backend::set_alive(result)
//!
//! Failover (http::dispatcher):
//!     Retries exhausted on a backend
//!     → BackendRegistry::mark_status(url, false)
//! ```
//!
//! # Design Decisions
//! - A single failed probe marks a backend dead; a single success revives it
//! - Probe failures are never fatal
//! - The monitor stops on the shutdown broadcast

pub mod active;

pub use active::HealthMonitor;
