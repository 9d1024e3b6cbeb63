//! Credential resolution shared by dispatch, synthesis and model listing.
//!
//! Rule: a server-held secret wins over a caller-supplied one; an empty secret
//! is only acceptable for backends that do not require one.

use std::collections::HashMap;

use crate::backends::registry::BackendRegistry;

/// Server-held secrets keyed by backend id.
#[derive(Default, Clone)]
pub struct SecretStore {
    secrets: HashMap<String, String>,
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.secrets.keys().collect();
        ids.sort();
        f.debug_struct("SecretStore").field("backends", &ids).finish()
    }
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty values are ignored.
    pub fn insert(&mut self, backend_id: impl Into<String>, secret: impl Into<String>) {
        let secret = secret.into();
        if !secret.trim().is_empty() {
            self.secrets.insert(backend_id.into(), secret);
        }
    }

    pub fn with(mut self, backend_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.insert(backend_id, secret);
        self
    }

    pub fn get(&self, backend_id: &str) -> Option<&str> {
        self.secrets.get(backend_id).map(String::as_str)
    }

    pub fn has(&self, backend_id: &str) -> bool {
        self.secrets.contains_key(backend_id)
    }

    /// Every held secret, for redaction.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.secrets.values().map(String::as_str)
    }
}

/// Resolve the credential for `backend_id`.
///
/// `None` means the backend is unknown, or requires a secret and none is available.
pub fn resolve_secret(
    store: &SecretStore,
    registry: &BackendRegistry,
    backend_id: &str,
    caller_secrets: &HashMap<String, String>,
) -> Option<String> {
    let requires_secret = registry.requires_secret(backend_id)?;

    if let Some(secret) = store.get(backend_id) {
        return Some(secret.to_string());
    }
    if let Some(secret) = caller_secrets.get(backend_id).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        return Some(secret.to_string());
    }
    if requires_secret {
        None
    } else {
        Some(String::new())
    }
}
