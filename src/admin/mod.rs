//! Management API: token issuance, audit access and status.
//!
//! Every route requires bearer authentication; individual handlers check the
//! scope they need (`read`, `write` or `admin`).

pub mod auth;
pub mod handlers;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get},
    Router,
};

use crate::http::middleware::ip_guard::ip_guard_middleware;
use crate::http::server::AppState;
use self::auth::admin_auth_middleware;
use self::handlers::*;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/tokens", get(list_tokens).post(create_token))
        .route("/admin/tokens/{id}", delete(revoke_token))
        .route("/admin/audit", get(query_audit))
        .route("/admin/audit/stats", get(audit_stats))
        .route("/admin/audit/anomalies/{client}", get(client_anomalies))
        .route_layer(from_fn_with_state(state.clone(), admin_auth_middleware))
        .route_layer(from_fn_with_state(state, ip_guard_middleware))
}
