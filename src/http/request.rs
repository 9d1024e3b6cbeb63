//! Request identification and tracing spans.
//!
//! # Responsibilities
//! - Assign an `x-request-id` (UUID v4) as early as possible
//! - Open one span per request carrying method, path and request id
//! - Reduce paths to bounded metric labels
//!
//! # Design Decisions
//! - tower-http's request-id layers generate and propagate the header
//! - An id supplied by the caller is kept

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Request};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// The request id, or `"unknown"` before the id layer ran.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Span for `TraceLayer::make_span_with`.
pub fn make_span(request: &Request<Body>) -> tracing::Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id(request.headers()),
    )
}

/// Metric label for a path; path parameters collapse to a placeholder.
pub fn route_label(path: &str) -> String {
    const PARAMETERIZED: [(&str, &str); 2] = [
        ("/admin/tokens/", "/admin/tokens/{id}"),
        ("/admin/audit/anomalies/", "/admin/audit/anomalies/{client}"),
    ];
    for (prefix, label) in PARAMETERIZED {
        if path.starts_with(prefix) && path.len() > prefix.len() {
            return label.to_string();
        }
    }
    match path {
        "/api/health" | "/api/csrf-token" | "/api/backends" | "/api/models" | "/api/dispatch"
        | "/admin/status" | "/admin/tokens" | "/admin/audit" | "/admin/audit/stats" => path.to_string(),
        _ => "other".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_labels_are_bounded() {
        assert_eq!(route_label("/api/dispatch"), "/api/dispatch");
        assert_eq!(
            route_label("/admin/tokens/0b6f2c9e-8f43-4c8e-9a53-3f6a0c7d1e22"),
            "/admin/tokens/{id}"
        );
        assert_eq!(route_label("/admin/audit/anomalies/1.2.3.4"), "/admin/audit/anomalies/{client}");
        assert_eq!(route_label("/wp-login.php"), "other");
    }

    #[test]
    fn test_request_id_fallback() {
        assert_eq!(request_id(&HeaderMap::new()), "unknown");
    }
}
