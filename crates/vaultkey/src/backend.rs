//! The closed set of provider backends

use vaultkey_aws::AwsSecretsManagerBackend;
use vaultkey_azure::AzureKeyVaultBackend;
use vaultkey_secrets::diagnostics::events;
use vaultkey_secrets::{
    BackendError, BackendType, Diagnostic, DiagnosticContext, DiagnosticLevel, DiagnosticSink,
    RawBackendConfig, SecretBackend, SecretDocument,
};

/// A constructed backend of any supported provider
#[derive(Debug)]
pub enum Backend {
    /// AWS Secrets Manager
    Aws(AwsSecretsManagerBackend),
    /// Azure Key Vault
    Azure(AzureKeyVaultBackend),
}

impl Backend {
    /// Construct the backend named by the `backend_type` field of `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::ConfigDecode`] if `backend_type` is missing or
    /// not a string, [`BackendError::UnsupportedBackend`] if it names no known
    /// provider, or whatever the provider's constructor returns.
    pub async fn from_config(
        backend_id: &str,
        raw: &RawBackendConfig,
        sink: &dyn DiagnosticSink,
    ) -> Result<Self, BackendError> {
        let backend_type = BackendType::from_raw(backend_id, raw).inspect_err(|err| {
            sink.record(
                &Diagnostic::new(
                    DiagnosticLevel::Error,
                    events::CONFIG_INVALID,
                    "unsupported backend configuration",
                    backend_id,
                )
                .with_error(err),
            );
        })?;

        match backend_type {
            BackendType::AwsSecretsManager => AwsSecretsManagerBackend::new(backend_id, raw, sink)
                .await
                .map(Self::Aws),
            BackendType::AzureKeyVault => AzureKeyVaultBackend::new(backend_id, raw, sink)
                .await
                .map(Self::Azure),
        }
    }
}

impl SecretBackend for Backend {
    fn context(&self) -> &DiagnosticContext {
        match self {
            Self::Aws(backend) => backend.context(),
            Self::Azure(backend) => backend.context(),
        }
    }

    fn document(&self) -> &SecretDocument {
        match self {
            Self::Aws(backend) => backend.document(),
            Self::Azure(backend) => backend.document(),
        }
    }
}
