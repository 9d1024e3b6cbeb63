//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_id.rs (derive the abuse-control key)
//!     → origin.rs + csrf.rs (origin allow-list, double-submit token)
//!       or tokens.rs (bearer token with dispatch scope skips the CSRF token)
//!     → ip_guard.rs (whitelist, blacklist, dynamic blocks)
//!     → rate_limit.rs (fixed window per client)
//!     → limits.rs + content_filter.rs (prompt shape, malicious patterns)
//!     → Pass to dispatch
//!
//! Outgoing backend text:
//!     → content_filter.rs (strip executable markup, entity-escape)
//! ```
//!
//! # Design Decisions
//! - Every service is an explicitly constructed value owned by the server state
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod client_id;
pub mod content_filter;
pub mod crypto;
pub mod csrf;
pub mod headers;
pub mod ip_guard;
pub mod limits;
pub mod origin;
pub mod rate_limit;
pub mod tokens;

pub use client_id::ClientIdentifier;
pub use content_filter::ContentFilter;
pub use csrf::CsrfGuard;
pub use ip_guard::IpGuard;
pub use origin::OriginGuard;
pub use rate_limit::RateLimiter;
pub use tokens::{Scope, TokenIssuer};
