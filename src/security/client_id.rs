//! Coarse client identification for abuse controls.
//!
//! The identifier is not authenticated. It keys rate-limit windows, violation
//! records and audit events, nothing else.

use std::net::SocketAddr;
use axum::http::HeaderMap;

pub const UNKNOWN_CLIENT: &str = "unknown";

/// Per-request client key, stored in request extensions by the outermost middleware.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentifier(String);

impl ClientIdentifier {
    /// Derive the identifier.
    ///
    /// With `trust_forwarded` set: first `X-Forwarded-For` entry, then `X-Real-IP`.
    /// Then the peer socket IP, then [`UNKNOWN_CLIENT`].
    pub fn from_request_parts(
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        trust_forwarded: bool,
    ) -> Self {
        if trust_forwarded {
            let forwarded = headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(ip) = forwarded {
                return Self(ip.to_string());
            }

            let real_ip = headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(ip) = real_ip {
                return Self(ip.to_string());
            }
        }

        match peer {
            Some(addr) => Self(addr.ip().to_string()),
            None => Self(UNKNOWN_CLIENT.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
