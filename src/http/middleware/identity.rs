//! Outermost gateway middleware: client identification and request metrics.

use std::net::SocketAddr;
use std::time::Instant;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::http::request::route_label;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::client_id::ClientIdentifier;

pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = ClientIdentifier::from_request_parts(
        request.headers(),
        peer,
        state.config.security.trust_forwarded_headers,
    );
    let route = route_label(request.uri().path());

    tracing::debug!(client = %client, route = %route, "Request received");
    request.extensions_mut().insert(client);

    let response = next.run(request).await;
    metrics::record_request(&route, response.status().as_u16(), start);
    response
}
