//! Fan-out dispatch and aggregation.

pub mod engine;
pub mod synthesis;
pub mod types;

pub use engine::DispatchEngine;
pub use types::{BackendResult, DispatchError, DispatchRequest, DispatchResponse, SynthesisSpec};
