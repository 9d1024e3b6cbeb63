//! Dispatch request and result shapes.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

use crate::backends::error::BackendErrorKind;
use crate::security::limits::InputError;

/// Second-stage merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisSpec {
    pub backend_id: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub prompt: String,
    pub backend_ids: Vec<String>,
    /// Caller-supplied secrets by backend id. Server-held secrets take precedence.
    #[serde(default)]
    pub secrets: HashMap<String, String>,
    #[serde(default)]
    pub model_overrides: HashMap<String, String>,
    #[serde(default)]
    pub synthesis: Option<SynthesisSpec>,
}

/// Outcome of one backend call. Exactly one of `content` and `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendResult {
    pub backend_id: String,
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<BackendErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical_detail: Option<String>,
    /// Set on the synthesis pass result.
    #[serde(default)]
    pub synthesis: bool,
    pub elapsed_ms: u64,
}

impl BackendResult {
    pub fn is_success(&self) -> bool {
        self.content.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchResponse {
    pub results: Vec<BackendResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] InputError),
    #[error("missing credentials for: {}", .0.join(", "))]
    MissingCredentials(Vec<String>),
}
