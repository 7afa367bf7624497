//! vaultkey: secrets from AWS Secrets Manager and Azure Key Vault
//!
//! Each configured backend fetches one secret document, a flat JSON object,
//! when it is constructed and answers key lookups from memory. The
//! [`BackendRegistry`] builds backends from raw configurations; the
//! [`protocol`] module answers `<backend_id>:<secret_key>` handles for the
//! `vaultkey` secret helper binary.

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod tracing;

pub use backend::Backend;
pub use config::ConfigFile;
pub use error::Error;
pub use registry::BackendRegistry;

pub use vaultkey_secrets::{
    BackendError, BackendType, DiagnosticSink, MemorySink, RawBackendConfig, SecretBackend,
    SecretOutput, TracingSink,
};
