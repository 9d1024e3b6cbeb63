//! Fan-out LLM gateway.
//!
//! Accepts one prompt, dispatches it concurrently to several configured
//! language-model backends, waits for every call to settle and optionally asks
//! one more backend to synthesize the answers. Every `/api` request passes an
//! admission chain (IP guard, origin and CSRF checks, per-client rate limit,
//! content filter) and security-relevant outcomes land in an in-memory audit log.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ http (layers, admission middleware) ──▶ dispatch engine ──┬─▶ backend A
//!                    │                                     │             ├─▶ backend B
//!                    ▼                                     ▼             └─▶ backend C
//!               security ◀──── violations ────▶ audit    synthesis ──▶ synthesizer backend
//!
//!   Cross-cutting: config (TOML + hot reload), observability (tracing, Prometheus),
//!                  lifecycle (startup, sweeper, shutdown), admin (tokens, audit access)
//! ```

// Core subsystems
pub mod backends;
pub mod config;
pub mod dispatch;
pub mod http;

// Security
pub mod admin;
pub mod audit;
pub mod security;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
