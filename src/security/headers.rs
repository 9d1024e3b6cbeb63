//! Security response headers.
//!
//! # Responsibilities
//! - Stop MIME sniffing and framing of gateway responses
//! - Suppress referrers and forbid active content in JSON responses
//!
//! # Design Decisions
//! - Applied as tower-http layers on the whole router, overriding handler values
//! - Toggled by `security.enable_headers`

use axum::http::{HeaderName, HeaderValue, header};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

/// Header name/value pairs added to every response.
pub fn security_headers() -> [(HeaderName, HeaderValue); 4] {
    [
        (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
        (header::REFERRER_POLICY, HeaderValue::from_static("no-referrer")),
        (
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        ),
    ]
}

/// Wrap `router` with one `SetResponseHeaderLayer` per security header.
pub fn apply_security_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    security_headers()
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::overriding(name, value))
        })
}
