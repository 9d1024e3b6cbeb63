//! OpenAI-compatible chat-completions backend.
//!
//! # Responsibilities
//! - `POST {base_url}/chat/completions` with bearer auth (omitted for an empty secret)
//! - `GET {base_url}/models` for model listing
//! - Map HTTP status and transport failures onto [`BackendErrorKind`]
//!
//! # Design Decisions
//! - No retries; the dispatch engine bounds each call with its own timeout
//! - Technical detail records method, path, model, temperature and truncated
//!   bodies, always redacted with the call's secret

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::backends::backend::{Backend, BackendDescriptor, GenerateOptions};
use crate::backends::error::{truncate_detail, BackendError, BackendErrorKind};
use crate::config::BackendConfig;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

pub struct OpenAiCompatibleBackend {
    descriptor: BackendDescriptor,
    base_url: String,
    temperature: f32,
    max_tokens: Option<u32>,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCompatibleBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleBackend")
            .field("id", &self.descriptor.id)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleBackend {
    pub fn new(config: &BackendConfig, client: reqwest::Client) -> Self {
        Self {
            descriptor: BackendDescriptor {
                id: config.id.clone(),
                display_name: if config.display_name.is_empty() {
                    config.id.clone()
                } else {
                    config.display_name.clone()
                },
                requires_secret: config.requires_secret,
                default_model: config.default_model.clone(),
            },
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder, secret: &str) -> reqwest::RequestBuilder {
        if secret.is_empty() {
            builder
        } else {
            builder.bearer_auth(secret)
        }
    }
}

/// Kind for a non-success HTTP status and its body.
fn classify_status(status: StatusCode, body: &str) -> BackendErrorKind {
    let lower = body.to_ascii_lowercase();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendErrorKind::Authentication,
        StatusCode::TOO_MANY_REQUESTS => BackendErrorKind::RateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => BackendErrorKind::Timeout,
        _ if lower.contains("quota") || lower.contains("rate limit") => BackendErrorKind::RateLimited,
        _ => BackendErrorKind::Transport,
    }
}

fn classify_transport(error: &reqwest::Error) -> BackendErrorKind {
    if error.is_timeout() {
        BackendErrorKind::Timeout
    } else {
        BackendErrorKind::Transport
    }
}

#[async_trait]
impl Backend for OpenAiCompatibleBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn generate(
        &self,
        prompt: &str,
        secret: &str,
        options: &GenerateOptions,
    ) -> Result<String, BackendError> {
        let mut body = json!({
            "model": options.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": options.temperature,
        });
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let request_detail = format!(
            "request: POST /chat/completions model={} temperature={} body={}",
            options.model,
            options.temperature,
            truncate_detail(&body.to_string())
        );
        let fail = |kind: BackendErrorKind, detail: String| {
            BackendError::new(kind, format!("{}; {}", request_detail, detail)).redacted_with(&[secret])
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .authorized(self.client.post(&url), secret)
            .json(&body)
            .send()
            .await
            .map_err(|e| fail(classify_transport(&e), format!("transport error: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| fail(classify_transport(&e), format!("status={} body read failed: {}", status, e)))?;

        if !status.is_success() {
            return Err(fail(
                classify_status(status, &text),
                format!("response: status={} body={}", status.as_u16(), truncate_detail(&text)),
            ));
        }

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            fail(
                BackendErrorKind::Transport,
                format!("response: status={} unparseable body ({}): {}", status.as_u16(), e, truncate_detail(&text)),
            )
        })?;

        let choice = parsed.choices.into_iter().next();
        if choice.as_ref().and_then(|c| c.finish_reason.as_deref()) == Some("content_filter") {
            return Err(fail(
                BackendErrorKind::EmptyResponse,
                "response: finish_reason=content_filter".to_string(),
            ));
        }

        let content = choice
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty());

        content.ok_or_else(|| {
            fail(
                BackendErrorKind::EmptyResponse,
                format!("response: status={} empty content: {}", status.as_u16(), truncate_detail(&text)),
            )
        })
    }

    async fn list_models(&self, secret: &str) -> Result<Vec<String>, BackendError> {
        let fail = |kind: BackendErrorKind, detail: String| {
            BackendError::new(kind, format!("request: GET /models; {}", detail)).redacted_with(&[secret])
        };

        let url = format!("{}/models", self.base_url);
        let response = self
            .authorized(self.client.get(&url), secret)
            .send()
            .await
            .map_err(|e| fail(classify_transport(&e), format!("transport error: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| fail(classify_transport(&e), format!("status={} body read failed: {}", status, e)))?;

        if !status.is_success() {
            return Err(fail(
                classify_status(status, &text),
                format!("response: status={} body={}", status.as_u16(), truncate_detail(&text)),
            ));
        }

        let list: ModelList = serde_json::from_str(&text).map_err(|e| {
            fail(BackendErrorKind::Transport, format!("unparseable model list ({}): {}", e, truncate_detail(&text)))
        })?;

        let mut models: Vec<String> = list.data.into_iter().map(|m| m.id).collect();
        models.sort();
        models.dedup();
        Ok(models)
    }

    fn supports_model_listing(&self) -> bool {
        true
    }

    fn default_options(&self, model_override: Option<&str>) -> GenerateOptions {
        GenerateOptions {
            model: model_override
                .filter(|m| !m.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| self.descriptor.default_model.clone()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}
