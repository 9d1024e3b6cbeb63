use std::time::Instant;

use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::admin::auth::AdminPrincipal;
use crate::audit::{AuditEvent, AuditQuery, AuditStats};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::security::tokens::{Scope, TokenInfo};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub backends: usize,
    pub rate_windows: usize,
    pub blocked_clients: usize,
    pub tokens: usize,
    pub audit_events: usize,
    pub audit_enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenRequest {
    pub name: String,
    pub scopes: Vec<Scope>,
    #[serde(default)]
    pub expiry_days: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyReport {
    pub client: String,
    pub anomalous: bool,
    pub window_minutes: i64,
    pub blocked: bool,
    pub violation_count: u32,
    pub last_reason: Option<String>,
}

pub async fn get_status(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
) -> Result<Json<SystemStatus>, ApiError> {
    principal.require(Scope::Read)?;
    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        backends: state.engine.registry().len(),
        rate_windows: state.rate_limiter.window_count(),
        blocked_clients: state.ip_guard.blocked_count(),
        tokens: state.tokens.len(),
        audit_events: state.audit.len(),
        audit_enabled: state.audit.is_enabled(),
    }))
}

pub async fn create_token(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    payload: Result<Json<CreateTokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Scope::Admin)?;
    let Json(request) = payload.map_err(|e| {
        ApiError::bad_request("Invalid request body").with_details(json!({ "reason": e.body_text() }))
    })?;

    let issued = state
        .tokens
        .issue(&request.name, &request.scopes, request.expiry_days)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok((StatusCode::CREATED, Json(issued)))
}

pub async fn list_tokens(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
) -> Result<Json<Vec<TokenInfo>>, ApiError> {
    principal.require(Scope::Read)?;
    Ok(Json(state.tokens.list()))
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    principal.require(Scope::Write)?;
    if state.tokens.revoke(&id) {
        Ok(Json(json!({ "id": id, "revoked": true })))
    } else {
        Err(ApiError::not_found("Token not found").with_details(json!({ "id": id, "revoked": false })))
    }
}

pub async fn query_audit(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> Result<Json<Vec<AuditEvent>>, ApiError> {
    principal.require(Scope::Read)?;
    let Query(query) = query.map_err(|e| {
        ApiError::bad_request("Invalid audit query").with_details(json!({ "reason": e.body_text() }))
    })?;
    Ok(Json(state.audit.query(&query)))
}

pub async fn audit_stats(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
) -> Result<Json<AuditStats>, ApiError> {
    principal.require(Scope::Read)?;
    Ok(Json(state.audit.stats()))
}

pub async fn client_anomalies(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    Path(client): Path<String>,
) -> Result<Json<AnomalyReport>, ApiError> {
    principal.require(Scope::Read)?;
    let window_minutes = state.config.audit.anomaly_window_minutes;
    let record = state.ip_guard.record(&client);
    let now = Instant::now();
    let blocked = record
        .as_ref()
        .and_then(|r| r.blocked_until)
        .is_some_and(|until| now < until);

    Ok(Json(AnomalyReport {
        anomalous: state.audit.is_anomalous(&client, window_minutes),
        window_minutes,
        blocked,
        violation_count: record.as_ref().map_or(0, |r| r.violation_count),
        last_reason: record.map(|r| r.last_reason),
        client,
    }))
}
