//! Pluggable generation backends.
//!
//! # Data Flow
//! ```text
//! config.backends
//!     → lifecycle::startup (build OpenAiCompatibleBackend per entry, load env secrets)
//!     → registry.rs (id → Arc<dyn Backend>)
//!     → secrets.rs (server-held secret, else caller secret, else empty if optional)
//!     → dispatch engine calls Backend::generate
//! ```
//!
//! # Design Decisions
//! - Backends are trait objects so tests and new providers plug in without
//!   touching the engine
//! - Every failure is a `BackendError` with a user-safe message and redacted detail

pub mod backend;
pub mod error;
pub mod openai;
pub mod registry;
pub mod secrets;

pub use backend::{Backend, BackendDescriptor, GenerateOptions};
pub use error::{redact, BackendError, BackendErrorKind};
pub use openai::OpenAiCompatibleBackend;
pub use registry::BackendRegistry;
pub use secrets::{resolve_secret, SecretStore};
