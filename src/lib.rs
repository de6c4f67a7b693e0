//! Layer-7 HTTP load balancer library.
//!
//! Round-robin and least-connections peer selection over a fixed set of
//! backends, TCP health probes, and per-request retry with failover.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;

pub use config::schema::LbConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::BackendRegistry;
