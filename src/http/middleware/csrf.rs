//! Origin and anti-forgery checks for the `/api` surface.
//!
//! Origin validation always applies. Then either a bearer token with the
//! `dispatch` scope, or a valid double-submit CSRF token for state-changing
//! methods, is required.

use axum::{
    body::Body,
    extract::{Extension, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use serde_json::json;

use crate::audit::{AuditEvent, AuditEventType, Severity};
use crate::http::middleware::bearer_token;
use crate::http::middleware::violation::{flag_violation, Violation};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::security::client_id::ClientIdentifier;
use crate::security::origin::OriginCheck;
use crate::security::tokens::Scope;

pub async fn csrf_middleware(
    State(state): State<AppState>,
    Extension(client): Extension<ClientIdentifier>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();

    if let OriginCheck::Rejected(origin) = state.origins.validate(request.headers()) {
        flag_violation(
            &state,
            &client,
            &path,
            Violation {
                event_type: AuditEventType::CsrfFailure,
                severity: Severity::Medium,
                reason: "origin",
                details: json!({ "reason": "origin not allowed", "origin": origin }),
            },
        );
        return Err(ApiError::forbidden("Origin not allowed"));
    }

    if let Some(token) = bearer_token(request.headers()) {
        return match state.tokens.verify(token) {
            Some(verified) if verified.has_scopes(&[Scope::Dispatch]) => {
                state.audit.record(AuditEvent::new(
                    AuditEventType::ApiKeyUsage,
                    Severity::Low,
                    client.as_str(),
                    &path,
                    json!({ "tokenId": verified.id, "name": verified.name }),
                ));
                Ok(next.run(request).await)
            }
            Some(verified) => {
                tracing::info!(client = %client, token_id = %verified.id, "Token without dispatch scope used on /api");
                Err(ApiError::forbidden("Token lacks the dispatch scope")
                    .with_details(json!({ "required": Scope::Dispatch })))
            }
            None => {
                flag_violation(
                    &state,
                    &client,
                    &path,
                    Violation {
                        event_type: AuditEventType::AuthFailure,
                        severity: Severity::Medium,
                        reason: "auth",
                        details: json!({ "reason": "invalid or expired token" }),
                    },
                );
                Err(ApiError::unauthorized("Invalid or expired token"))
            }
        };
    }

    if let Err(failure) = state.csrf.validate(request.method(), request.headers()) {
        flag_violation(
            &state,
            &client,
            &path,
            Violation {
                event_type: AuditEventType::CsrfFailure,
                severity: Severity::Medium,
                reason: "csrf",
                details: json!({ "reason": failure.to_string(), "method": request.method().as_str() }),
            },
        );
        return Err(ApiError::forbidden("CSRF validation failed")
            .with_details(json!({ "reason": failure.to_string() })));
    }

    Ok(next.run(request).await)
}
