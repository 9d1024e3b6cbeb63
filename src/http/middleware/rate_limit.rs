//! Fixed-window rate limiting for backend-calling routes.

use axum::{
    body::Body,
    extract::{Extension, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use serde_json::json;

use crate::audit::{AuditEventType, Severity};
use crate::http::middleware::violation::{flag_violation, Violation};
use crate::http::response::{apply_rate_limit_headers, ApiError};
use crate::http::server::AppState;
use crate::security::client_id::ClientIdentifier;

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    Extension(client): Extension<ClientIdentifier>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let decision = state.rate_limiter.check(client.as_str());

    if !decision.allowed {
        flag_violation(
            &state,
            &client,
            request.uri().path(),
            Violation {
                event_type: AuditEventType::RateLimitExceeded,
                severity: Severity::Medium,
                reason: "rate_limit",
                details: json!({ "limit": decision.limit, "resetInSecs": decision.retry_after_secs() }),
            },
        );
        return Err(ApiError::rate_limited(&decision));
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    Ok(response)
}
