//! Backend lookup by id.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backends::backend::{Backend, BackendDescriptor};

/// Static, in-memory table of backends built at startup.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn Backend>>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.backends.keys().collect();
        ids.sort();
        f.debug_struct("BackendRegistry").field("backends", &ids).finish()
    }
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under its descriptor id, replacing any previous one.
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        let id = backend.descriptor().id.clone();
        if self.backends.insert(id.clone(), backend).is_some() {
            tracing::warn!(backend = %id, "Backend registered twice, keeping the latest");
        }
    }

    pub fn with(mut self, backend: Arc<dyn Backend>) -> Self {
        self.register(backend);
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Backend>> {
        self.backends.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.backends.contains_key(id)
    }

    /// `None` for unknown ids.
    pub fn requires_secret(&self, id: &str) -> Option<bool> {
        self.backends.get(id).map(|b| b.descriptor().requires_secret)
    }

    /// Descriptors sorted by id.
    pub fn descriptors(&self) -> Vec<BackendDescriptor> {
        let mut descriptors: Vec<BackendDescriptor> =
            self.backends.values().map(|b| b.descriptor().clone()).collect();
        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        descriptors
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
