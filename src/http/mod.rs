//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, body buffering)
//!     → request.rs (request ID, hop-by-hop + X-Forwarded-* headers)
//!     → dispatcher.rs (peer selection, retry, failover)
//!     → load_balancer transport (forward to backend)
//!     → response.rs (strip hop-by-hop, 503 rendering)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::{DispatchError, Dispatcher};
pub use request::{ForwardRequest, MakeRequestUuidV4, X_REQUEST_ID};
pub use server::HttpServer;
