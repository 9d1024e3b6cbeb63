//! Security audit subsystem.
//!
//! # Data Flow
//! ```text
//! rejection / backend failure / token use
//!     → event.rs (typed event with severity)
//!     → log.rs (ring buffer + tracing mirror + metrics)
//!     → admin handlers (query, stats, anomaly checks)
//! ```

pub mod event;
pub mod log;

pub use event::{AuditEvent, AuditEventType, AuditQuery, Severity};
pub use log::{AuditLog, AuditStats};
