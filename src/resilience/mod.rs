//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Backend call from the dispatch engine:
//!     → timeouts.rs (per-call deadline)
//!     → failure captured as a tagged result, siblings unaffected
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No automatic retries; retry policy belongs to the caller

pub mod timeouts;
