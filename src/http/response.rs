//! Error responses.
//!
//! # Responsibilities
//! - One error type for every handler and middleware rejection
//! - JSON body `{error, details?}` with the matching status code
//! - Rate-limit metadata as headers and body fields
//!
//! # Design Decisions
//! - Internal errors are logged server-side; the caller gets a generic message
//! - Validation messages are reported verbatim

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::dispatch::DispatchError;
use crate::security::rate_limit::RateDecision;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<Value>,
    headers: HeaderMap,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Log `detail` and hide it from the caller.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "Internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    pub fn rate_limited(decision: &RateDecision) -> Self {
        let reset_at = decision.reset_at_unix();
        let mut err = Self::new(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").with_details(json!({
            "limit": decision.limit,
            "remaining": decision.remaining,
            "resetAt": reset_at,
            "retryAfterSecs": decision.retry_after_secs(),
        }));
        apply_rate_limit_headers(&mut err.headers, decision);
        err.headers
            .insert(header::RETRY_AFTER, HeaderValue::from(decision.retry_after_secs()));
        err
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "error": self.message });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        let mut response = (self.status, Json(body)).into_response();
        response.headers_mut().extend(self.headers);
        response
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(e) => ApiError::bad_request(e.to_string()),
            DispatchError::MissingCredentials(backends) => {
                ApiError::bad_request("Missing credentials").with_details(json!({ "backends": backends }))
            }
        }
    }
}

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at_unix()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::bad_request("prompt must not be empty").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body, json!({ "error": "prompt must not be empty" }));
    }

    #[tokio::test]
    async fn test_missing_credentials_names_backends() {
        let response = ApiError::from(DispatchError::MissingCredentials(vec!["z".into()])).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["details"]["backends"], json!(["z"]));
    }

    #[tokio::test]
    async fn test_rate_limited_headers_and_body() {
        let decision = RateDecision {
            allowed: false,
            limit: 10,
            remaining: 0,
            reset_after: Duration::from_millis(12_500),
        };
        let response = ApiError::rate_limited(&decision).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "13");
        assert_eq!(response.headers()["x-ratelimit-limit"], "10");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        let body = body_json(response).await;
        assert_eq!(body["details"]["remaining"], 0);
        assert!(body["details"]["resetAt"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_internal_hides_detail() {
        let err = ApiError::internal("db password=hunter2");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "Internal server error");
    }
}
