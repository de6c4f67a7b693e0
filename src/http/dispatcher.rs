//! Per-request dispatch with retry and failover.
//!
//! ```text
//! Dispatching ──attempts > max──────────────────────▶ Rejected (503)
//!      │      ──no alive backend────────────────────▶ Rejected (503)
//!      ▼
//! Forwarding ──ok─────────────────────────────────▶ Succeeded
//!      │
//!      ▼ transport error
//! retries < max ──▶ sleep, Forwarding (same backend, retries + 1)
//! otherwise     ──▶ mark backend dead, Dispatching (attempts + 1)
//! ```
//!
//! Dropping the dispatch future (client went away) abandons the forward and
//! any pending retry.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Response, StatusCode},
    response::IntoResponse,
};
use http_body_util::BodyExt;
use thiserror::Error;

use crate::http::request::ForwardRequest;
use crate::http::response;
use crate::load_balancer::{BackendConnectionGuard, BackendRegistry};
use crate::observability::metrics;
use crate::resilience::{AttemptState, FailureAction, RetryPolicy};

/// Request-level failures visible to the client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no backend available")]
    NoBackendAvailable,

    #[error("max attempts reached after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("failed to read request body")]
    BodyRead,
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NoBackendAvailable | DispatchError::AttemptsExhausted { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            DispatchError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            DispatchError::BodyRead => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> axum::response::Response {
        match self {
            DispatchError::NoBackendAvailable | DispatchError::AttemptsExhausted { .. } => {
                response::service_unavailable()
            }
            DispatchError::BodyTooLarge { .. } => {
                response::plain_text(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
            }
            DispatchError::BodyRead => {
                response::plain_text(StatusCode::BAD_REQUEST, "Failed to read request body")
            }
        }
    }
}

/// Selects peers from the registry and drives the retry/failover policy.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<BackendRegistry>,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(registry: Arc<BackendRegistry>, policy: RetryPolicy) -> Self {
        Self { registry, policy }
    }

    /// Forward `request` to a backend, retrying and failing over as needed.
    pub async fn dispatch(&self, request: &ForwardRequest) -> Result<Response<Body>, DispatchError> {
        let mut state = AttemptState::new();

        loop {
            if !self.policy.can_dispatch(state) {
                tracing::warn!(
                    request_id = %request.request_id(),
                    path = %request.uri().path(),
                    attempts = state.attempts() - 1,
                    "Max attempts reached, terminating"
                );
                metrics::record_rejection("max_attempts");
                return Err(DispatchError::AttemptsExhausted {
                    attempts: state.attempts() - 1,
                });
            }

            let peer = match self.registry.get_peer() {
                Some(peer) => peer,
                None => {
                    tracing::warn!(
                        request_id = %request.request_id(),
                        path = %request.uri().path(),
                        "No alive backend"
                    );
                    metrics::record_rejection("no_backend");
                    return Err(DispatchError::NoBackendAvailable);
                }
            };

            match self.forward(&peer, request, state).await {
                Ok(response) => {
                    metrics::record_request(
                        response.status().as_u16(),
                        peer.url().as_str(),
                        request.received_at(),
                    );
                    return Ok(release_on_completion(response, peer));
                }
                Err(next) => state = next,
            }
        }
    }

    /// Forward to one peer until it answers or its retries run out.
    ///
    /// On failover the peer is marked dead and the next attempt's state is
    /// returned as the error.
    async fn forward(
        &self,
        peer: &BackendConnectionGuard,
        request: &ForwardRequest,
        mut state: AttemptState,
    ) -> Result<Response<Body>, AttemptState> {
        loop {
            let error = match peer.forward(request.to_request()).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            tracing::warn!(
                request_id = %request.request_id(),
                backend = %peer.url(),
                attempt = state.attempts(),
                retry = state.retries(),
                error = %error,
                "Upstream error"
            );

            match self.policy.on_failure(state) {
                FailureAction::Retry(delay) => {
                    metrics::record_retry(peer.url().as_str());
                    tokio::time::sleep(delay).await;
                    state = state.next_retry();
                }
                FailureAction::FailOver => {
                    self.registry.mark_status(peer.url(), false);
                    metrics::record_failover(peer.url().as_str());
                    metrics::record_backend_health(peer.url().as_str(), false);
                    let next = state.next_attempt();
                    tracing::info!(
                        request_id = %request.request_id(),
                        backend = %peer.url(),
                        path = %request.uri().path(),
                        attempt = next.attempts(),
                        "Backend marked down, attempting retry"
                    );
                    return Err(next);
                }
            }
        }
    }
}

/// Keep the peer guard alive until the response body is finished or dropped.
fn release_on_completion(response: Response<Body>, peer: BackendConnectionGuard) -> Response<Body> {
    let (parts, body) = response.into_parts();
    let body = body.map_frame(move |frame| {
        let _held = &peer;
        frame
    });
    Response::from_parts(parts, Body::new(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Bytes;
    use axum::http::Request;
    use url::Url;

    use crate::config::Policy;
    use crate::load_balancer::{Backend, Transport, TransportError};

    /// Fails the first `failures` calls, then answers with `body`.
    struct Scripted {
        calls: Arc<AtomicU32>,
        failures: u32,
        body: &'static str,
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            // Every forward carries the full buffered body.
            let payload = axum::body::to_bytes(request.into_body(), usize::MAX)
                .await
                .map_err(|e| TransportError::Other(e.to_string()))?;
            assert_eq!(&payload[..], b"ping");

            if n < self.failures {
                Err(TransportError::Other("connection refused".into()))
            } else {
                Ok(Response::new(Body::from(self.body)))
            }
        }
    }

    fn registry(
        policy: Policy,
        specs: &[(&'static str, u32)],
    ) -> (Arc<BackendRegistry>, Vec<Arc<AtomicU32>>) {
        let mut registry = BackendRegistry::new(policy);
        let mut counters = Vec::new();
        for (host, failures) in specs {
            let calls = Arc::new(AtomicU32::new(0));
            counters.push(calls.clone());
            registry.register(Backend::new(
                Url::parse(&format!("http://{}", host)).unwrap(),
                Box::new(Scripted {
                    calls,
                    failures: *failures,
                    body: *host,
                }),
            ));
        }
        (Arc::new(registry), counters)
    }

    fn dispatcher(registry: Arc<BackendRegistry>) -> Dispatcher {
        Dispatcher::new(
            registry,
            RetryPolicy {
                retry_delay: Duration::from_millis(1),
                ..RetryPolicy::default()
            },
        )
    }

    fn request() -> ForwardRequest {
        let (parts, _) = Request::builder().uri("/work").body(()).unwrap().into_parts();
        ForwardRequest::new(parts, Bytes::from_static(b"ping"), None)
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let (registry, calls) = registry(Policy::RoundRobin, &[("a:1", 0), ("b:2", 0)]);
        let response = dispatcher(registry).dispatch(&request()).await.unwrap();
        assert_eq!(body_text(response).await, "b:2");
        assert_eq!(calls[1].load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_retries_same_backend() {
        let (registry, calls) = registry(Policy::RoundRobin, &[("a:1", 0), ("b:2", 2)]);
        let response = dispatcher(registry.clone()).dispatch(&request()).await.unwrap();

        assert_eq!(body_text(response).await, "b:2");
        assert_eq!(calls[1].load(Ordering::SeqCst), 3);
        assert_eq!(calls[0].load(Ordering::SeqCst), 0);
        assert!(registry.backends()[1].is_alive());
    }

    #[tokio::test]
    async fn test_fails_over_after_retries() {
        let (registry, calls) = registry(Policy::RoundRobin, &[("a:1", 0), ("b:2", u32::MAX)]);
        let response = dispatcher(registry.clone()).dispatch(&request()).await.unwrap();

        assert_eq!(body_text(response).await, "a:1");
        assert_eq!(calls[1].load(Ordering::SeqCst), 4);
        assert_eq!(calls[0].load(Ordering::SeqCst), 1);
        assert!(!registry.backends()[1].is_alive());
        assert!(registry.backends()[0].is_alive());
    }

    #[tokio::test]
    async fn test_attempts_exhausted_bounds_total_forwards() {
        let (registry, calls) = registry(
            Policy::RoundRobin,
            &[("a:1", u32::MAX), ("b:2", u32::MAX), ("c:3", u32::MAX), ("d:4", u32::MAX)],
        );
        let d = dispatcher(registry.clone());
        let err = d.dispatch(&request()).await.unwrap_err();

        assert_eq!(err, DispatchError::AttemptsExhausted { attempts: 3 });
        let total: u32 = calls.iter().map(|c| c.load(Ordering::SeqCst)).sum();
        assert_eq!(total, RetryPolicy::default().max_forwards());
        assert_eq!(total, 12);
        // Three backends abandoned, one never tried.
        assert_eq!(registry.alive_count(), 1);
    }

    #[tokio::test]
    async fn test_single_dead_backend_is_rejected() {
        let (registry, calls) = registry(Policy::RoundRobin, &[("a:1", u32::MAX)]);
        let err = dispatcher(registry.clone()).dispatch(&request()).await.unwrap_err();

        assert_eq!(err, DispatchError::NoBackendAvailable);
        assert_eq!(calls[0].load(Ordering::SeqCst), 4);
        assert_eq!(registry.alive_count(), 0);
    }

    #[tokio::test]
    async fn test_no_alive_backend_is_503() {
        let (registry, calls) = registry(Policy::LeastConnections, &[("a:1", 0)]);
        registry.backends()[0].set_alive(false);

        let err = dispatcher(registry).dispatch(&request()).await.unwrap_err();
        assert_eq!(calls[0].load(Ordering::SeqCst), 0);

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_text(response).await, "Service not available");
    }

    #[tokio::test]
    async fn test_exhausted_and_no_backend_look_the_same() {
        let a = DispatchError::AttemptsExhausted { attempts: 3 }.into_response();
        let b = DispatchError::NoBackendAvailable.into_response();
        assert_eq!(a.status(), b.status());
        assert_eq!(body_text(a).await, body_text(b).await);
    }

    // Least-connections counts are released once the response body is done,
    // not when the handler returns.
    #[tokio::test]
    async fn test_least_connections_released_after_body() {
        let (registry, _) = registry(Policy::LeastConnections, &[("a:1", 0), ("b:2", 0)]);
        let d = dispatcher(registry.clone());

        let response = d.dispatch(&request()).await.unwrap();
        assert_eq!(registry.backends()[0].active_connections(), 1);

        assert_eq!(body_text(response).await, "a:1");
        assert_eq!(registry.backends()[0].active_connections(), 0);
    }

    #[tokio::test]
    async fn test_least_connections_released_on_failover() {
        let (registry, _) = registry(Policy::LeastConnections, &[("a:1", u32::MAX), ("b:2", 0)]);
        let response = dispatcher(registry.clone()).dispatch(&request()).await.unwrap();
        assert_eq!(registry.backends()[0].active_connections(), 0);
        assert_eq!(registry.backends()[1].active_connections(), 1);
        drop(response);
        assert_eq!(registry.backends()[1].active_connections(), 0);
    }
}
