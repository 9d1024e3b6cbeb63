//! Request-origin allow-listing.
//!
//! A request passes when its `Origin` (falling back to `Referer`) is:
//! - the same origin as the `Host` it was sent to, or
//! - listed in `csrf.allowed_origins`, or
//! - a loopback or RFC 1918 private-network host.
//!
//! Requests carrying neither header cannot be cross-site browser requests and
//! pass; the CSRF token check still applies to them.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use arc_swap::ArcSwap;
use axum::http::{HeaderMap, header};
use url::{Host, Url};

/// Outcome of an origin check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginCheck {
    NoOrigin,
    SameOrigin,
    AllowListed,
    LocalNetwork,
    Rejected(String),
}

impl OriginCheck {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, OriginCheck::Rejected(_))
    }
}

#[derive(Debug)]
pub struct OriginGuard {
    allowed: ArcSwap<Vec<String>>,
}

impl OriginGuard {
    pub fn new(allowed_origins: &[String]) -> Self {
        Self {
            allowed: ArcSwap::from_pointee(normalize_all(allowed_origins)),
        }
    }

    /// Replace the allow-list atomically.
    pub fn update_allowed(&self, allowed_origins: &[String]) {
        self.allowed.store(Arc::new(normalize_all(allowed_origins)));
        tracing::info!(count = allowed_origins.len(), "Allowed origins updated");
    }

    pub fn validate(&self, headers: &HeaderMap) -> OriginCheck {
        let source = headers
            .get(header::ORIGIN)
            .or_else(|| headers.get(header::REFERER))
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let Some(source) = source else {
            return OriginCheck::NoOrigin;
        };

        let url = match Url::parse(source) {
            Ok(url) if url.has_host() => url,
            _ => return OriginCheck::Rejected(source.to_string()),
        };

        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(|h| h.to_ascii_lowercase());
        if host.as_deref() == Some(authority(&url).as_str()) {
            return OriginCheck::SameOrigin;
        }

        let origin = url.origin().ascii_serialization();
        if self.allowed.load().iter().any(|a| *a == origin) {
            return OriginCheck::AllowListed;
        }

        if is_local_host(&url) {
            return OriginCheck::LocalNetwork;
        }

        OriginCheck::Rejected(origin)
    }
}

/// `host[:port]` as it would appear in a `Host` header.
fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    }
}

fn is_local_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => is_local_v4(ip),
        Some(Host::Ipv6(ip)) => is_local_v6(ip),
        None => false,
    }
}

fn is_local_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private()
}

fn is_local_v6(ip: Ipv6Addr) -> bool {
    ip.is_loopback() || ip.to_ipv4_mapped().is_some_and(is_local_v4)
}

fn normalize_all(origins: &[String]) -> Vec<String> {
    origins
        .iter()
        .filter_map(|o| match Url::parse(o) {
            Ok(url) => Some(url.origin().ascii_serialization()),
            Err(e) => {
                tracing::warn!(origin = %o, error = %e, "Ignoring invalid allowed origin");
                None
            }
        })
        .collect()
}
