//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to the composition root (HttpServer::new)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server applies the reloadable subset (access lists, origins, audit flag)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only access lists are hot-swapped
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Backend credentials never live in the file, only in the environment

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::GatewayConfig;
pub use schema::{
    AdminConfig, AuditConfig, BackendConfig, CsrfConfig, IpGuardConfig, LimitsConfig,
    ListenerConfig, ObservabilityConfig, RateLimitConfig, SecurityConfig, TimeoutConfig,
};
