//! IP reputation check.

use axum::{
    body::Body,
    extract::{Extension, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use serde_json::json;

use crate::audit::{AuditEvent, AuditEventType, Severity};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::client_id::ClientIdentifier;
use crate::security::ip_guard::{DenyReason, GuardDecision};

pub async fn ip_guard_middleware(
    State(state): State<AppState>,
    Extension(client): Extension<ClientIdentifier>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let reason = match state.ip_guard.is_allowed(client.as_str()) {
        GuardDecision::Allowed => return Ok(next.run(request).await),
        GuardDecision::Denied(reason) => reason,
    };

    metrics::record_rejection("ip_denied");
    state.audit.record(AuditEvent::new(
        AuditEventType::IpBlocked,
        Severity::Medium,
        client.as_str(),
        request.uri().path(),
        json!({ "reason": reason.to_string() }),
    ));

    let mut details = json!({ "reason": reason.to_string() });
    if let DenyReason::Blocked { remaining } = reason {
        details["retryAfterSecs"] = json!(remaining.as_secs().max(1));
    }
    Err(ApiError::forbidden("Access denied").with_details(details))
}
