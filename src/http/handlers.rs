//! `/api` route handlers.

use std::collections::HashMap;
use std::time::Duration;
use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::{AuditEvent, AuditEventType, Severity};
use crate::backends::secrets::resolve_secret;
use crate::dispatch::{DispatchError, DispatchRequest, DispatchResponse};
use crate::http::middleware::violation::{flag_violation, Violation};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::resilience::timeouts::with_timeout;
use crate::security::client_id::ClientIdentifier;

const DISPATCH_PATH: &str = "/api/dispatch";
const MODELS_PATH: &str = "/api/models";

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Serialize)]
pub struct CsrfTokenResponse {
    pub token: String,
}

pub async fn csrf_token(State(state): State<AppState>) -> Result<Response, ApiError> {
    let token = state.csrf.issue();
    let cookie = HeaderValue::from_str(&state.csrf.cookie_header(&token)).map_err(ApiError::internal)?;
    let mut response = Json(CsrfTokenResponse { token }).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendInfo {
    pub id: String,
    pub display_name: String,
    pub requires_secret: bool,
    pub has_server_secret: bool,
    pub supports_model_listing: bool,
    pub default_model: String,
}

pub async fn backends(State(state): State<AppState>) -> Json<Vec<BackendInfo>> {
    let registry = state.engine.registry();
    let secrets = state.engine.secrets();
    let infos = registry
        .descriptors()
        .into_iter()
        .map(|d| BackendInfo {
            has_server_secret: secrets.has(&d.id),
            supports_model_listing: registry.get(&d.id).is_some_and(|b| b.supports_model_listing()),
            id: d.id,
            display_name: d.display_name,
            requires_secret: d.requires_secret,
            default_model: d.default_model,
        })
        .collect();
    Json(infos)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsRequest {
    pub backend_id: String,
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsResponse {
    pub backend_id: String,
    pub models: Vec<String>,
}

pub async fn list_models(
    State(state): State<AppState>,
    Extension(client): Extension<ClientIdentifier>,
    payload: Result<Json<ModelsRequest>, JsonRejection>,
) -> Result<Json<ModelsResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| reject_body(&state, &client, MODELS_PATH, e))?;
    let registry = state.engine.registry();

    let backend = registry
        .get(&request.backend_id)
        .ok_or_else(|| ApiError::bad_request(format!("unknown backend '{}'", request.backend_id)))?;
    if !backend.supports_model_listing() {
        return Err(ApiError::bad_request("backend does not support model listing"));
    }

    let caller_secrets: HashMap<String, String> = request
        .secret
        .map(|s| HashMap::from([(request.backend_id.clone(), s)]))
        .unwrap_or_default();
    let secret = resolve_secret(state.engine.secrets(), registry, &request.backend_id, &caller_secrets)
        .ok_or_else(|| ApiError::from(DispatchError::MissingCredentials(vec![request.backend_id.clone()])))?;

    let limit = Duration::from_secs(state.config.timeouts.backend_call_secs);
    match with_timeout(limit, backend.list_models(&secret)).await {
        Ok(models) => Ok(Json(ModelsResponse {
            backend_id: request.backend_id,
            models,
        })),
        Err(e) => {
            let e = e.redacted_with(&[secret.as_str()]);
            state.audit.record(AuditEvent::new(
                AuditEventType::Error,
                Severity::Medium,
                client.as_str(),
                MODELS_PATH,
                json!({ "backend": request.backend_id, "kind": e.kind, "detail": e.technical }),
            ));
            Err(ApiError::new(StatusCode::BAD_GATEWAY, e.user_message())
                .with_details(json!({ "kind": e.kind, "technicalDetail": e.technical })))
        }
    }
}

pub async fn dispatch(
    State(state): State<AppState>,
    Extension(client): Extension<ClientIdentifier>,
    payload: Result<Json<DispatchRequest>, JsonRejection>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| reject_body(&state, &client, DISPATCH_PATH, e))?;

    let detection = state.filter.detect_malicious(&request.prompt);
    if detection.is_malicious {
        let patterns: Vec<&str> = detection.patterns.iter().map(|p| p.as_str()).collect();
        flag_violation(
            &state,
            &client,
            DISPATCH_PATH,
            Violation {
                event_type: AuditEventType::InvalidInput,
                severity: Severity::High,
                reason: "malicious_input",
                details: json!({ "patterns": patterns }),
            },
        );
        return Err(ApiError::bad_request("Input rejected by content filter")
            .with_details(json!({ "patterns": patterns })));
    }

    let results = match state.engine.run(&request).await {
        Ok(results) => results,
        Err(e) => {
            state.audit.record(AuditEvent::new(
                AuditEventType::InvalidInput,
                Severity::Low,
                client.as_str(),
                DISPATCH_PATH,
                json!({ "reason": e.to_string() }),
            ));
            return Err(e.into());
        }
    };

    for failed in results.iter().filter(|r| !r.is_success()) {
        state.audit.record(AuditEvent::new(
            AuditEventType::Error,
            Severity::Medium,
            client.as_str(),
            DISPATCH_PATH,
            json!({
                "backend": failed.backend_id,
                "synthesis": failed.synthesis,
                "kind": failed.error_kind,
                "detail": failed.technical_detail,
            }),
        ));
    }

    Ok(Json(DispatchResponse { results }))
}

/// Audit a body that failed to decode and turn it into a 400.
fn reject_body(state: &AppState, client: &ClientIdentifier, path: &str, rejection: JsonRejection) -> ApiError {
    let message = rejection.body_text();
    state.audit.record(AuditEvent::new(
        AuditEventType::InvalidInput,
        Severity::Low,
        client.as_str(),
        path,
        json!({ "reason": message }),
    ));
    ApiError::bad_request("Invalid request body").with_details(json!({ "reason": message }))
}
