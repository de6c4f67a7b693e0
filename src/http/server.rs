//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Buffer the inbound body and hand the request to the dispatcher
//! - Own the health monitor task for the server's lifetime
//! - Graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{ConfigError, LbConfig};
use crate::health::HealthMonitor;
use crate::http::dispatcher::{DispatchError, Dispatcher};
use crate::http::request::{ForwardRequest, MakeRequestUuidV4};
use crate::http::response;
use crate::lifecycle::{shutdown, Shutdown};
use crate::load_balancer::BackendRegistry;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub max_body_bytes: usize,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    config: LbConfig,
    registry: Arc<BackendRegistry>,
}

impl HttpServer {
    /// Create a new HTTP server, building backends from the configuration.
    pub fn new(config: LbConfig) -> Result<Self, ConfigError> {
        let registry = Arc::new(BackendRegistry::from_config(&config)?);
        Ok(Self::with_registry(config, registry))
    }

    /// Create a server around an existing registry.
    pub fn with_registry(config: LbConfig, registry: Arc<BackendRegistry>) -> Self {
        let policy = RetryPolicy::from(&config.retries);
        tracing::debug!(
            max_retries = policy.max_retries,
            max_attempts = policy.max_attempts,
            max_forwards = policy.max_forwards(),
            "Retry policy"
        );
        let dispatcher = Dispatcher::new(registry.clone(), policy);
        let state = AppState {
            dispatcher: Arc::new(dispatcher),
            max_body_bytes: config.limits.max_body_bytes,
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            registry,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &LbConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::GATEWAY_TIMEOUT,
                        Duration::from_secs(config.timeouts.request_secs),
                    )),
            )
    }

    /// Run the server until `shutdown` is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            policy = %self.registry.policy(),
            backends = self.registry.len(),
            "Load balancer started"
        );

        let monitor = HealthMonitor::new(self.registry.clone(), &self.config.health_check);
        let monitor = tokio::spawn(monitor.run(shutdown.subscribe()));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown.subscribe()))
            .await;

        // Stop the monitor even if serving failed.
        shutdown.trigger();
        if let Err(e) = monitor.await {
            tracing::error!(error = %e, "Health monitor task failed");
        }

        tracing::info!("HTTP server stopped");
        result
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }
}

/// Catch-all proxy handler.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let error = if is_length_limit(e) {
                DispatchError::BodyTooLarge {
                    limit: state.max_body_bytes,
                }
            } else {
                DispatchError::BodyRead
            };
            tracing::warn!(client = %addr, error = %error, "Rejecting request body");
            return error.into_response();
        }
    };

    let forward = ForwardRequest::new(parts, body, Some(addr.ip()));

    tracing::debug!(
        request_id = %forward.request_id(),
        method = %forward.method(),
        path = %forward.uri().path(),
        "Dispatching request"
    );

    match state.dispatcher.dispatch(&forward).await {
        Ok(upstream) => response::from_backend(upstream),
        Err(e) => {
            metrics::record_request(e.status().as_u16(), "none", forward.received_at());
            e.into_response()
        }
    }
}

fn is_length_limit(error: axum::Error) -> bool {
    let inner = error.into_inner();
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(inner.as_ref());
    while let Some(err) = source {
        if err.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        source = err.source();
    }
    false
}
