//! Structured diagnostics for backend construction and lookup
//!
//! Backends never log through a process-wide logger. Callers pass a
//! [`DiagnosticSink`] into every constructor and lookup, and backends report
//! failures as [`Diagnostic`] records carrying identifiers only: backend id,
//! backend type, provider secret id and provider identifiers such as the AWS
//! profile or the Key Vault URL. Secret values are never part of a record.
//!
//! [`TracingSink`] forwards records to `tracing`; [`MemorySink`] keeps them in
//! memory.

use crate::BackendType;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Tracing target used by [`TracingSink`]
pub const TRACING_TARGET: &str = "vaultkey::backend";

/// Event types carried in [`Diagnostic::event`]
pub mod events {
    /// Raw configuration failed to decode or validate
    pub const CONFIG_INVALID: &str = "backend.config_invalid";
    /// Session/credential setup failed
    pub const SESSION_FAILED: &str = "backend.session_failed";
    /// The remote fetch failed
    pub const FETCH_FAILED: &str = "backend.fetch_failed";
    /// The fetched payload is not a flat JSON object
    pub const PARSE_FAILED: &str = "backend.parse_failed";
    /// The secret document was fetched and parsed
    pub const LOADED: &str = "backend.loaded";
    /// A lookup asked for a key the document does not contain
    pub const KEY_NOT_FOUND: &str = "backend.key_not_found";
}

/// Severity of a [`Diagnostic`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    /// Routine progress
    Debug,
    /// Unexpected but handled
    Warn,
    /// A failed operation
    Error,
}

/// A structured diagnostic record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub level: DiagnosticLevel,
    /// Event type, one of [`events`]
    pub event: &'static str,
    /// Human-readable summary
    pub message: &'static str,
    /// Backend identifier
    pub backend_id: String,
    /// Provider variant, when known
    pub backend_type: Option<BackendType>,
    /// Provider-side secret identifier, when known
    pub secret_id: Option<String>,
    /// Provider-specific identifiers (profile, access key id, vault URL)
    pub identifiers: Vec<(&'static str, String)>,
    /// Requested key name, for lookups
    pub secret_key: Option<String>,
    /// Error text, for failures
    pub error: Option<String>,
}

impl Diagnostic {
    /// Create a record with only the backend identifier set.
    #[must_use]
    pub fn new(
        level: DiagnosticLevel,
        event: &'static str,
        message: &'static str,
        backend_id: impl Into<String>,
    ) -> Self {
        Self {
            level,
            event,
            message,
            backend_id: backend_id.into(),
            backend_type: None,
            secret_id: None,
            identifiers: Vec::new(),
            secret_key: None,
            error: None,
        }
    }

    /// Attach the provider variant.
    #[must_use]
    pub const fn with_backend_type(mut self, backend_type: BackendType) -> Self {
        self.backend_type = Some(backend_type);
        self
    }

    /// Attach the requested key name.
    #[must_use]
    pub fn with_secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Attach the error text.
    #[must_use]
    pub fn with_error(mut self, error: &dyn fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Identifiers a backend attaches to every record it emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticContext {
    /// Backend identifier
    pub backend_id: String,
    /// Provider variant
    pub backend_type: BackendType,
    /// Provider-side secret identifier
    pub secret_id: String,
    /// Provider-specific identifiers
    pub identifiers: Vec<(&'static str, String)>,
}

impl DiagnosticContext {
    /// Create a context for one backend.
    #[must_use]
    pub fn new(
        backend_id: impl Into<String>,
        backend_type: BackendType,
        secret_id: impl Into<String>,
    ) -> Self {
        Self {
            backend_id: backend_id.into(),
            backend_type,
            secret_id: secret_id.into(),
            identifiers: Vec::new(),
        }
    }

    /// Attach a provider identifier; `None` values are skipped.
    #[must_use]
    pub fn with_identifier(mut self, name: &'static str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.identifiers.push((name, value.to_string()));
        }
        self
    }

    /// Build a record pre-filled with this context.
    #[must_use]
    pub fn diagnostic(
        &self,
        level: DiagnosticLevel,
        event: &'static str,
        message: &'static str,
    ) -> Diagnostic {
        Diagnostic {
            backend_type: Some(self.backend_type),
            secret_id: Some(self.secret_id.clone()),
            identifiers: self.identifiers.clone(),
            ..Diagnostic::new(level, event, message, self.backend_id.clone())
        }
    }
}

/// Receiver of backend diagnostics
pub trait DiagnosticSink: Send + Sync {
    /// Record one diagnostic.
    fn record(&self, diagnostic: &Diagnostic);
}

/// Forwards diagnostics to `tracing` under the [`TRACING_TARGET`] target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

struct Identifiers<'a>(&'a [(&'static str, String)]);

impl fmt::Display for Identifiers<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

impl DiagnosticSink for TracingSink {
    fn record(&self, diagnostic: &Diagnostic) {
        macro_rules! emit {
            ($level:ident) => {
                ::tracing::$level!(
                    target: TRACING_TARGET,
                    event_type = diagnostic.event,
                    backend_id = %diagnostic.backend_id,
                    backend_type = diagnostic.backend_type.map(BackendType::as_str),
                    secret_id = diagnostic.secret_id.as_deref(),
                    identifiers = %Identifiers(&diagnostic.identifiers),
                    secret_key = diagnostic.secret_key.as_deref(),
                    error = diagnostic.error.as_deref(),
                    "{}",
                    diagnostic.message
                )
            };
        }

        match diagnostic.level {
            DiagnosticLevel::Debug => emit!(debug),
            DiagnosticLevel::Warn => emit!(warn),
            DiagnosticLevel::Error => emit!(error),
        }
    }
}

/// Keeps diagnostics in memory, in emission order
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records so far.
    #[must_use]
    pub fn records(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// Records with the given event type.
    #[must_use]
    pub fn events(&self, event: &str) -> Vec<Diagnostic> {
        self.records()
            .into_iter()
            .filter(|d| d.event == event)
            .collect()
    }

    /// Number of records so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panicking recorder must not hide what was already recorded.
    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, diagnostic: &Diagnostic) {
        self.lock().push(diagnostic.clone());
    }
}
