//! Bearer authentication for the admin surface.
//!
//! The bootstrap `admin.api_key` grants every scope. Any other bearer value
//! must be a live issued token; its scopes gate the individual handlers.

use std::collections::BTreeSet;
use axum::{
    body::Body,
    extract::{Extension, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use serde_json::json;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditEventType, Severity};
use crate::http::middleware::bearer_token;
use crate::http::middleware::violation::{flag_violation, Violation};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::security::client_id::ClientIdentifier;
use crate::security::crypto::constant_time_eq;
use crate::security::tokens::{has_scopes, Scope};

/// Authenticated admin caller, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AdminPrincipal {
    /// `None` for the bootstrap key.
    pub token_id: Option<Uuid>,
    pub scopes: BTreeSet<Scope>,
}

impl AdminPrincipal {
    pub fn require(&self, scope: Scope) -> Result<(), ApiError> {
        if has_scopes(&self.scopes, &[scope]) {
            Ok(())
        } else {
            Err(ApiError::forbidden("Insufficient scope").with_details(json!({ "required": scope })))
        }
    }
}

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    Extension(client): Extension<ClientIdentifier>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();
    let presented = bearer_token(request.headers()).map(str::to_string);

    let principal = presented.as_deref().and_then(|token| {
        let bootstrap = &state.config.admin.api_key;
        if !bootstrap.is_empty() && constant_time_eq(bootstrap.as_bytes(), token.as_bytes()) {
            return Some(AdminPrincipal {
                token_id: None,
                scopes: Scope::ALL.into_iter().collect(),
            });
        }
        state.tokens.verify(token).map(|verified| AdminPrincipal {
            token_id: Some(verified.id),
            scopes: verified.scopes,
        })
    });

    let Some(principal) = principal else {
        flag_violation(
            &state,
            &client,
            &path,
            Violation {
                event_type: AuditEventType::AuthFailure,
                severity: Severity::Medium,
                reason: "auth",
                details: json!({
                    "reason": if presented.is_some() { "invalid credentials" } else { "missing credentials" },
                }),
            },
        );
        return Err(ApiError::unauthorized("Invalid or missing admin credentials"));
    };

    state.audit.record(AuditEvent::new(
        AuditEventType::ApiKeyUsage,
        Severity::Low,
        client.as_str(),
        &path,
        json!({ "tokenId": principal.token_id, "method": request.method().as_str() }),
    ));

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
