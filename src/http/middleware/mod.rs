//! Request admission middleware.
//!
//! # Data Flow
//! ```text
//! identity.rs    every route: derive ClientIdentifier, record request metrics
//! csrf.rs        /api (except health): origin, then bearer token or CSRF token
//! ip_guard.rs    /api (except health) and /admin: whitelist, blacklist, blocks
//! rate_limit.rs  backend-calling routes: fixed window per client
//! ```

pub mod csrf;
pub mod identity;
pub mod ip_guard;
pub mod rate_limit;
pub mod violation;

use axum::http::{HeaderMap, header};

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
