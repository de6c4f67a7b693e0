//! Response handling and transformation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers from backend responses
//! - Render the capacity error shown to clients
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - "No backend alive" and "max attempts reached" look the same to clients

use axum::{
    body::Body,
    http::{header, HeaderValue, Response, StatusCode},
    response::IntoResponse,
};

use crate::http::request::strip_hop_by_hop;

pub const SERVICE_NOT_AVAILABLE: &str = "Service not available";

/// 503 with a short plain-text body.
pub fn service_unavailable() -> Response<Body> {
    plain_text(StatusCode::SERVICE_UNAVAILABLE, SERVICE_NOT_AVAILABLE)
}

pub fn plain_text(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = (status, message).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Prepare a backend response for the client.
pub fn from_backend(mut response: Response<Body>) -> Response<Body> {
    strip_hop_by_hop(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_service_unavailable_body() {
        let response = service_unavailable();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], SERVICE_NOT_AVAILABLE.as_bytes());
    }

    #[test]
    fn test_from_backend_strips_connection_headers() {
        let response = Response::builder()
            .header("connection", "close")
            .header("content-type", "application/json")
            .body(Body::empty())
            .unwrap();
        let response = from_backend(response);
        assert!(response.headers().get("connection").is_none());
        assert_eq!(response.headers().get("content-type").unwrap(), "application/json");
    }
}
