//! Secret backends for vaultkey
//!
//! Provides the contract every provider backend implements: a backend is bound
//! to one remote secret document, fetches it once at construction time, and
//! answers point lookups from the parsed, flat key/value mapping.
//!
//! Provider implementations are in separate crates:
//! - `vaultkey-aws`: AWS Secrets Manager
//! - `vaultkey-azure`: Azure Key Vault
//!
//! # Lookup
//!
//! ```ignore
//! use vaultkey_secrets::{SecretBackend, TracingSink};
//!
//! let output = backend.get_secret_output("db_password", &TracingSink);
//! match output.value() {
//!     Some(value) => use_secret(value),
//!     None => skip(output.error()),
//! }
//! ```

mod config;
pub mod diagnostics;
mod document;
mod types;

pub use config::{BACKEND_TYPE_KEY, BackendType, RawBackendConfig, TypedBackendConfig, decode_config};
pub use diagnostics::{
    Diagnostic, DiagnosticContext, DiagnosticLevel, DiagnosticSink, MemorySink, TracingSink,
};
pub use document::{PayloadError, SecretDocument, load_document};
pub use types::{SecretOutput, SecureSecret};

use async_trait::async_trait;
use thiserror::Error;

/// Error returned by lookups for keys the fetched document does not contain.
pub const KEY_NOT_FOUND_MESSAGE: &str = "backend does not provide secret key";

/// Error types for backend construction and lookup
///
/// Every variant except [`BackendError::KeyNotFound`] is terminal: it is only
/// produced while a backend is being constructed, and no backend instance
/// exists afterwards.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The raw configuration does not match the provider's schema
    #[error("Invalid configuration for backend '{backend_id}': {message}")]
    ConfigDecode {
        /// Backend identifier
        backend_id: String,
        /// What was wrong with the configuration
        message: String,
    },

    /// The `backend_type` discriminator names no known provider
    #[error("Unsupported backend type '{backend_type}' for backend '{backend_id}'")]
    UnsupportedBackend {
        /// Backend identifier
        backend_id: String,
        /// The discriminator that was requested
        backend_type: String,
    },

    /// Credentials or the provider session could not be set up
    #[error("Failed to initialize session for backend '{backend_id}': {message}")]
    SessionInit {
        /// Backend identifier
        backend_id: String,
        /// Error message from the credential chain or token endpoint
        message: String,
    },

    /// The remote call for the secret document failed
    #[error("Failed to retrieve secret '{secret_id}' for backend '{backend_id}': {message}")]
    Fetch {
        /// Backend identifier
        backend_id: String,
        /// Provider-side secret identifier
        secret_id: String,
        /// Transport, authorization or not-found detail
        message: String,
    },

    /// The fetched payload is not a flat JSON object of strings
    #[error("Failed to parse secret '{secret_id}' for backend '{backend_id}': {message}")]
    Parse {
        /// Backend identifier
        backend_id: String,
        /// Provider-side secret identifier
        secret_id: String,
        /// Parse failure detail (never contains payload content)
        message: String,
    },

    /// The requested key is absent from an otherwise valid document
    #[error("backend does not provide secret key")]
    KeyNotFound {
        /// Backend identifier
        backend_id: String,
        /// The key that was requested
        secret_key: String,
    },
}

impl BackendError {
    /// Identifier of the backend this error belongs to.
    #[must_use]
    pub fn backend_id(&self) -> &str {
        match self {
            Self::ConfigDecode { backend_id, .. }
            | Self::UnsupportedBackend { backend_id, .. }
            | Self::SessionInit { backend_id, .. }
            | Self::Fetch { backend_id, .. }
            | Self::Parse { backend_id, .. }
            | Self::KeyNotFound { backend_id, .. } => backend_id,
        }
    }

    /// Whether this error prevents a backend from being constructed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::KeyNotFound { .. })
    }
}

/// A provider client able to fetch one raw secret payload.
///
/// Implemented by each provider's client wrapper; [`load_document`] drives it
/// exactly once per backend.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Fetch the raw secret payload described by `context`.
    ///
    /// Implementations perform a single remote call with no retries and map
    /// every failure to [`BackendError::Fetch`] (or [`BackendError::Parse`] when
    /// the provider returns a payload that cannot be a document at all).
    async fn fetch_secret(&self, context: &DiagnosticContext) -> Result<SecureSecret, BackendError>;
}

/// A constructed backend answering key lookups.
///
/// Backends are immutable after construction: lookups take `&self`, never
/// touch the network and never change the document, so repeated lookups of the
/// same key return identical results.
pub trait SecretBackend: Send + Sync {
    /// Identifiers used for diagnostics.
    fn context(&self) -> &DiagnosticContext;

    /// The document fetched at construction time.
    fn document(&self) -> &SecretDocument;

    /// Backend identifier from the configuration.
    fn backend_id(&self) -> &str {
        &self.context().backend_id
    }

    /// Provider variant of this backend.
    fn backend_type(&self) -> BackendType {
        self.context().backend_type
    }

    /// Look up a key, returning a typed error when it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::KeyNotFound`] if the document has no such key.
    fn lookup(&self, secret_key: &str) -> Result<&SecureSecret, BackendError> {
        self.document()
            .get(secret_key)
            .ok_or_else(|| BackendError::KeyNotFound {
                backend_id: self.backend_id().to_string(),
                secret_key: secret_key.to_string(),
            })
    }

    /// Look up a key, returning the discriminated [`SecretOutput`].
    ///
    /// A miss is recorded on `sink` with the backend's identifiers and the
    /// requested key name.
    fn get_secret_output(&self, secret_key: &str, sink: &dyn DiagnosticSink) -> SecretOutput {
        match self.lookup(secret_key) {
            Ok(secret) => SecretOutput::from_value(secret.expose()),
            Err(err) => {
                sink.record(
                    &self
                        .context()
                        .diagnostic(
                            DiagnosticLevel::Error,
                            diagnostics::events::KEY_NOT_FOUND,
                            KEY_NOT_FOUND_MESSAGE,
                        )
                        .with_secret_key(secret_key),
                );
                SecretOutput::from_error(err.to_string())
            }
        }
    }
}
