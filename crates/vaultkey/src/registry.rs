//! Backend registry
//!
//! Constructs backends from raw configurations and hands out shared handles by
//! backend id.

use crate::backend::Backend;
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use vaultkey_secrets::{BackendError, DiagnosticSink, RawBackendConfig, SecretBackend};

/// Tracing target for registry events
pub const TRACING_TARGET: &str = "vaultkey::registry";

/// Registry of constructed backends
///
/// # Example
///
/// ```ignore
/// use vaultkey::BackendRegistry;
/// use vaultkey_secrets::TracingSink;
///
/// let mut registry = BackendRegistry::new();
/// registry.create_from_config("prod-db", &raw, &TracingSink).await?;
///
/// let backend = registry.resolve("prod-db").unwrap();
/// let output = backend.get_secret_output("db_password", &TracingSink);
/// ```
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<Backend>>,
}

impl BackendRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Construct a backend and register it under `backend_id`.
    ///
    /// A backend already registered under the same id is replaced.
    ///
    /// # Errors
    ///
    /// Returns the construction error; the registry is left unchanged.
    pub async fn create_from_config(
        &mut self,
        backend_id: &str,
        raw: &RawBackendConfig,
        sink: &dyn DiagnosticSink,
    ) -> Result<Arc<Backend>, BackendError> {
        let backend = Arc::new(Backend::from_config(backend_id, raw, sink).await?);
        self.insert(Arc::clone(&backend));
        Ok(backend)
    }

    /// Construct several backends concurrently.
    ///
    /// Successes are registered; failures are returned keyed by backend id.
    pub async fn create_all<'a, I>(
        &mut self,
        configs: I,
        sink: &dyn DiagnosticSink,
    ) -> BTreeMap<String, BackendError>
    where
        I: IntoIterator<Item = (&'a str, &'a RawBackendConfig)>,
    {
        let results = join_all(configs.into_iter().map(|(backend_id, raw)| async move {
            (backend_id, Backend::from_config(backend_id, raw, sink).await)
        }))
        .await;

        let mut failures = BTreeMap::new();
        for (backend_id, result) in results {
            match result {
                Ok(backend) => self.insert(Arc::new(backend)),
                Err(err) => {
                    tracing::debug!(
                        target: TRACING_TARGET,
                        backend_id,
                        error = %err,
                        "backend construction failed"
                    );
                    failures.insert(backend_id.to_string(), err);
                }
            }
        }
        failures
    }

    fn insert(&mut self, backend: Arc<Backend>) {
        tracing::debug!(
            target: TRACING_TARGET,
            backend_id = backend.backend_id(),
            backend_type = backend.backend_type().as_str(),
            keys = backend.document().len(),
            "backend registered"
        );
        self.backends
            .insert(backend.backend_id().to_string(), backend);
    }

    /// Get a backend by id
    ///
    /// Returns `None` if no backend is registered under the given id.
    #[must_use]
    pub fn resolve(&self, backend_id: &str) -> Option<Arc<Backend>> {
        self.backends.get(backend_id).cloned()
    }

    /// Check if a backend is registered under the given id
    #[must_use]
    pub fn has(&self, backend_id: &str) -> bool {
        self.backends.contains_key(backend_id)
    }

    /// All registered backend ids, sorted
    #[must_use]
    pub fn backend_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered backends
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether no backend is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.backend_ids())
            .finish()
    }
}
