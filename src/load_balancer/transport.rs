//! Forwarding transport owned by each backend.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the backend's base URL
//! - Send the request over a keep-alive connection pool bound to one backend
//! - Report transport-level failures (connect refused, reset, timeout) as errors
//!
//! HTTP status codes are never errors here: a 500 from the backend is a
//! successful forward.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, Uri};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use thiserror::Error;
use url::Url;

/// A transport-level forwarding failure.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upstream request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("invalid upstream uri: {0}")]
    InvalidUri(#[from] axum::http::Error),

    #[error("{0}")]
    Other(String),
}

/// Sends a prepared request to one specific backend.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, TransportError>;
}

/// Connection settings shared by every backend transport.
#[derive(Debug, Clone, Copy)]
pub struct TransportSettings {
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Single-host HTTP transport backed by a pooled hyper client.
pub struct HttpTransport {
    target: Url,
    client: Client<HttpConnector, Body>,
}

impl HttpTransport {
    pub fn new(target: Url, settings: TransportSettings) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(settings.connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(settings.idle_timeout)
            .pool_timer(TokioTimer::new())
            .build(connector);

        Self { target, client }
    }

    /// Map an inbound URI onto the target, joining the base path.
    pub fn upstream_uri(&self, inbound: &Uri) -> Result<Uri, axum::http::Error> {
        let path = join_paths(self.target.path(), inbound.path());
        let query = match (self.target.query(), inbound.query()) {
            (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => Some(format!("{}&{}", a, b)),
            (Some(a), _) if !a.is_empty() => Some(a.to_string()),
            (_, Some(b)) if !b.is_empty() => Some(b.to_string()),
            _ => None,
        };

        let authority = match self.target.port() {
            Some(port) => format!("{}:{}", self.target.host_str().unwrap_or_default(), port),
            None => self.target.host_str().unwrap_or_default().to_string(),
        };

        let path_and_query = match query {
            Some(q) => format!("{}?{}", path, q),
            None => path,
        };

        Uri::builder()
            .scheme(self.target.scheme())
            .authority(authority.as_str())
            .path_and_query(path_and_query.as_str())
            .build()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn forward(&self, mut request: Request<Body>) -> Result<Response<Body>, TransportError> {
        *request.uri_mut() = self.upstream_uri(request.uri())?;
        let response: Response<Incoming> = self.client.request(request).await?;
        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}
