//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server and own its forwarding transport
//! - Track liveness (written by health checks and failover)
//! - Track active connections (for Least Connections LB)

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use url::Url;

use crate::load_balancer::transport::{HttpTransport, Transport, TransportError, TransportSettings};

/// A single backend server.
pub struct Backend {
    /// Identity of the backend; unique within a registry.
    url: Url,
    /// Liveness; true at registration.
    alive: AtomicBool,
    /// Number of in-flight requests routed here by least-connections.
    active_connections: AtomicUsize,
    transport: Box<dyn Transport>,
}

impl Backend {
    /// Create a backend with its own transport.
    pub fn new(url: Url, transport: Box<dyn Transport>) -> Self {
        Self {
            url,
            alive: AtomicBool::new(true),
            active_connections: AtomicUsize::new(0),
            transport,
        }
    }

    /// Create a backend forwarding over HTTP.
    pub fn http(url: Url, settings: TransportSettings) -> Self {
        let transport = HttpTransport::new(url.clone(), settings);
        Self::new(url, Box::new(transport))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Increment active connection count.
    pub fn inc_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement active connection count, saturating at zero.
    pub fn dec_connections(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Forward a prepared request through this backend's transport.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, TransportError> {
        self.transport.forward(request).await
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("url", &self.url.as_str())
            .field("alive", &self.is_alive())
            .field("active_connections", &self.active_connections())
            .finish()
    }
}

/// A selected backend.
///
/// When the selection took a connection slot (least-connections), dropping
/// the guard gives it back. Keep the guard alive until the response body has
/// been written.
#[derive(Debug)]
pub struct BackendConnectionGuard {
    backend: Arc<Backend>,
    counted: bool,
}

impl BackendConnectionGuard {
    pub(crate) fn new(backend: Arc<Backend>, counted: bool) -> Self {
        Self { backend, counted }
    }
}

impl Deref for BackendConnectionGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for BackendConnectionGuard {
    fn drop(&mut self) {
        if self.counted {
            self.backend.dec_connections();
        }
    }
}
