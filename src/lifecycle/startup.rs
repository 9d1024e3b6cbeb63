//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn backend configuration into live [`Backend`] instances
//! - Collect server-held credentials from the environment
//!
//! # Design Decisions
//! - Fail fast: a backend that cannot be constructed aborts startup
//! - Secrets are read once; rotating one requires a restart

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::backends::{Backend, BackendRegistry, OpenAiCompatibleBackend, SecretStore};
use crate::config::GatewayConfig;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("no backends configured")]
    NoBackends,
}

/// Build the registry of every configured backend, sharing one pooled client.
pub fn build_registry(config: &GatewayConfig) -> Result<BackendRegistry, StartupError> {
    if config.backends.is_empty() {
        return Err(StartupError::NoBackends);
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeouts.backend_call_secs))
        .user_agent(concat!("fanout-gateway/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let mut registry = BackendRegistry::new();
    for backend in &config.backends {
        let instance: Arc<dyn Backend> = Arc::new(OpenAiCompatibleBackend::new(backend, client.clone()));
        tracing::info!(
            backend = %backend.id,
            base_url = %backend.base_url,
            default_model = %backend.default_model,
            "Backend registered"
        );
        registry.register(instance);
    }
    Ok(registry)
}

/// Read server-held secrets using each backend's configured environment variable.
pub fn load_secrets(config: &GatewayConfig) -> SecretStore {
    load_secrets_with(config, |name| std::env::var(name).ok())
}

pub fn load_secrets_with<F>(config: &GatewayConfig, lookup: F) -> SecretStore
where
    F: Fn(&str) -> Option<String>,
{
    let mut store = SecretStore::new();
    for backend in &config.backends {
        let var = backend.secret_env_var();
        match lookup(&var) {
            Some(secret) if !secret.trim().is_empty() => {
                tracing::info!(backend = %backend.id, env = %var, "Server-held secret loaded");
                store.insert(backend.id.clone(), secret);
            }
            _ if backend.requires_secret => {
                tracing::warn!(
                    backend = %backend.id,
                    env = %var,
                    "No server-held secret; callers must supply one"
                );
            }
            _ => {}
        }
    }
    store
}
