//! The capability every generation backend exposes.

use async_trait::async_trait;
use serde::Serialize;

use crate::backends::error::{BackendError, BackendErrorKind};

/// Static description of a registered backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendDescriptor {
    pub id: String,
    pub display_name: String,
    pub requires_secret: bool,
    pub default_model: String,
}

/// Per-call generation options.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    fn descriptor(&self) -> &BackendDescriptor;

    /// Produce text for `prompt`. An empty `secret` means "no credential".
    async fn generate(
        &self,
        prompt: &str,
        secret: &str,
        options: &GenerateOptions,
    ) -> Result<String, BackendError>;

    /// Available model identifiers, ordered.
    async fn list_models(&self, _secret: &str) -> Result<Vec<String>, BackendError> {
        Err(BackendError::new(
            BackendErrorKind::Unsupported,
            format!("backend '{}' does not list models", self.descriptor().id),
        ))
    }

    fn supports_model_listing(&self) -> bool {
        false
    }

    /// Options derived from the backend's defaults, with an optional model override.
    fn default_options(&self, model_override: Option<&str>) -> GenerateOptions {
        GenerateOptions {
            model: model_override
                .filter(|m| !m.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| self.descriptor().default_model.clone()),
            temperature: 0.7,
            max_tokens: None,
        }
    }
}
