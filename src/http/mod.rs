//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, global layers)
//!     → request.rs (request id, span)
//!     → middleware/ (identity → origin/CSRF → IP guard → rate limit)
//!     → handlers.rs (health, csrf-token, backends, models, dispatch)
//!     → response.rs (uniform JSON errors, rate-limit headers)
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::ApiError;
pub use server::{AppState, HttpServer};
