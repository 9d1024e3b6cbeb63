//! Fan-out dispatch with settle-all aggregation and an optional synthesis pass.
//!
//! # Responsibilities
//! - Validate the request shape against the configured limits
//! - Resolve every credential (synthesis included) before any call is made
//! - Call all selected backends concurrently, each under its own timeout
//! - Sanitize successful output and tag failures with a stable message
//! - Append the synthesis result, built from every fan-out outcome
//!
//! # Data Flow
//! ```text
//! DispatchRequest
//!     → validate (prompt, ids, registry lookup)
//!     → resolve_secret per backend (fail fast on any missing)
//!     → join_all(generate + timeout) ── one failure never cancels a sibling
//!     → sanitize / redact
//!     → [synthesis over all outcomes]
//!     → Vec<BackendResult>
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};
use futures_util::future::join_all;

use crate::backends::backend::{Backend, GenerateOptions};
use crate::backends::error::{redact, BackendError};
use crate::backends::registry::BackendRegistry;
use crate::backends::secrets::{resolve_secret, SecretStore};
use crate::config::LimitsConfig;
use crate::dispatch::synthesis::{build_synthesis_prompt, SynthesisInput};
use crate::dispatch::types::{BackendResult, DispatchError, DispatchRequest};
use crate::observability::metrics;
use crate::resilience::timeouts::with_timeout;
use crate::security::content_filter::ContentFilter;
use crate::security::limits::{normalize_backend_ids, validate_prompt, InputError};

/// A backend ready to be called.
struct PlannedCall {
    backend: Arc<dyn Backend>,
    secret: String,
    options: GenerateOptions,
}

/// A settled call: the public result plus the unsanitized text for synthesis.
struct Settled {
    result: BackendResult,
    raw: Option<String>,
}

pub struct DispatchEngine {
    registry: Arc<BackendRegistry>,
    secrets: Arc<SecretStore>,
    filter: Arc<ContentFilter>,
    limits: LimitsConfig,
    call_timeout: Duration,
}

impl DispatchEngine {
    pub fn new(
        registry: Arc<BackendRegistry>,
        secrets: Arc<SecretStore>,
        filter: Arc<ContentFilter>,
        limits: LimitsConfig,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            secrets,
            filter,
            limits,
            call_timeout,
        }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    pub async fn run(&self, request: &DispatchRequest) -> Result<Vec<BackendResult>, DispatchError> {
        validate_prompt(&request.prompt, &self.limits)?;
        let ids = normalize_backend_ids(&request.backend_ids, &self.limits)?;
        if let Some(unknown) = ids.iter().find(|id| !self.registry.contains(id)) {
            return Err(InputError::UnknownBackend(unknown.clone()).into());
        }
        if let Some(spec) = &request.synthesis {
            if !self.registry.contains(spec.backend_id.trim()) {
                return Err(InputError::UnknownBackend(spec.backend_id.clone()).into());
            }
        }

        let mut missing = Vec::new();
        let mut planned = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.plan(id, request, request.model_overrides.get(id).map(String::as_str)) {
                Some(call) => planned.push(call),
                None => missing.push(id.clone()),
            }
        }
        let synthesis_call = match &request.synthesis {
            Some(spec) => {
                let id = spec.backend_id.trim();
                let call = self.plan(id, request, spec.model.as_deref());
                if call.is_none() && !missing.iter().any(|m| m == id) {
                    missing.push(id.to_string());
                }
                call
            }
            None => None,
        };
        if !missing.is_empty() {
            tracing::warn!(backends = ?missing, "Dispatch rejected, missing credentials");
            return Err(DispatchError::MissingCredentials(missing));
        }

        let known_secrets = self.known_secrets(request);
        let known: Vec<&str> = known_secrets.iter().map(String::as_str).collect();

        tracing::info!(backends = ?ids, synthesis = synthesis_call.is_some(), "Dispatching prompt");
        let settled: Vec<Settled> = join_all(
            planned
                .iter()
                .map(|call| self.execute(call, &request.prompt, false, &known)),
        )
        .await;

        let mut results: Vec<BackendResult> = Vec::with_capacity(settled.len() + 1);
        if let Some(call) = synthesis_call {
            let inputs: Vec<SynthesisInput<'_>> = settled
                .iter()
                .map(|s| SynthesisInput {
                    provider: &s.result.provider,
                    outcome: match (&s.raw, &s.result.error) {
                        (Some(raw), _) => Ok(raw.as_str()),
                        (None, Some(error)) => Err(error.as_str()),
                        (None, None) => Err("no output"),
                    },
                })
                .collect();
            let prompt = build_synthesis_prompt(&request.prompt, &inputs);
            let synthesized = self.execute(&call, &prompt, true, &known).await;
            results.extend(settled.into_iter().map(|s| s.result));
            results.push(synthesized.result);
        } else {
            results.extend(settled.into_iter().map(|s| s.result));
        }

        Ok(results)
    }

    fn plan(&self, id: &str, request: &DispatchRequest, model_override: Option<&str>) -> Option<PlannedCall> {
        let backend = self.registry.get(id)?;
        let secret = resolve_secret(&self.secrets, &self.registry, id, &request.secrets)?;
        let options = backend.default_options(model_override);
        Some(PlannedCall { backend, secret, options })
    }

    /// Server-held and caller-supplied secrets, for redaction.
    fn known_secrets(&self, request: &DispatchRequest) -> Vec<String> {
        self.secrets
            .values()
            .map(str::to_string)
            .chain(
                request
                    .secrets
                    .values()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            )
            .collect()
    }

    async fn execute(&self, call: &PlannedCall, prompt: &str, synthesis: bool, known: &[&str]) -> Settled {
        let descriptor = call.backend.descriptor();
        let start = Instant::now();
        let outcome = with_timeout(
            self.call_timeout,
            call.backend.generate(prompt, &call.secret, &call.options),
        )
        .await;
        let elapsed = start.elapsed();

        let mut result = BackendResult {
            backend_id: descriptor.id.clone(),
            provider: descriptor.display_name.clone(),
            model: call.options.model.clone(),
            content: None,
            error: None,
            error_kind: None,
            technical_detail: None,
            synthesis,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        };

        match outcome {
            Ok(text) => {
                metrics::record_backend_call(&descriptor.id, "success", elapsed);
                tracing::debug!(
                    backend = %descriptor.id,
                    synthesis,
                    elapsed_ms = result.elapsed_ms,
                    "Backend call succeeded"
                );
                result.content = Some(self.filter.sanitize_output(&text));
                Settled { result, raw: Some(text) }
            }
            Err(error) => {
                let BackendError { kind, technical } = error;
                let technical = redact(&technical, known);
                metrics::record_backend_call(&descriptor.id, kind.as_str(), elapsed);
                tracing::warn!(
                    backend = %descriptor.id,
                    synthesis,
                    kind = kind.as_str(),
                    detail = %technical,
                    "Backend call failed"
                );
                result.error = Some(kind.user_message().to_string());
                result.error_kind = Some(kind);
                result.technical_detail = Some(technical);
                Settled { result, raw: None }
            }
        }
    }
}
