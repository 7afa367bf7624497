//! Azure Key Vault backend

use crate::client::{KeyVaultClient, KeyVaultError};
use crate::session::{self, AzureSessionConfig};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use vaultkey_secrets::diagnostics::events;
use vaultkey_secrets::{
    BackendError, BackendType, Diagnostic, DiagnosticContext, DiagnosticLevel, DiagnosticSink,
    RawBackendConfig, SecretBackend, SecretDocument, SecretSource, SecureSecret,
    TypedBackendConfig, decode_config, load_document,
};

/// Configuration for an Azure Key Vault backend
///
/// ```yaml
/// backend_type: azure.keyvault
/// keyvaulturl: https://myvault.vault.azure.net
/// secret_id: app-secrets
/// azure_session:
///   azure_tenant_id: 00000000-0000-0000-0000-000000000000
///   azure_client_id: 00000000-0000-0000-0000-000000000000
///   azure_client_secret: ...
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AzureKeyVaultConfig {
    /// Must be `azure.keyvault`
    pub backend_type: BackendType,

    /// Credentials; missing fields fall back to the environment
    #[serde(default)]
    pub azure_session: AzureSessionConfig,

    /// Vault URL
    pub keyvaulturl: String,

    /// Secret name within the vault
    pub secret_id: String,

    /// Secret version; absent means the current version
    #[serde(default)]
    pub secret_version: Option<String>,
}

impl AzureKeyVaultConfig {
    /// Identifiers reported with every diagnostic of this backend.
    #[must_use]
    pub fn diagnostic_context(&self, backend_id: &str) -> DiagnosticContext {
        DiagnosticContext::new(backend_id, BackendType::AzureKeyVault, &self.secret_id)
            .with_identifier("keyvaulturl", Some(&self.keyvaulturl))
            .with_identifier(
                "azure_client_id",
                self.azure_session.azure_client_id.as_deref(),
            )
    }
}

// Key Vault object names: 1-127 characters of [0-9a-zA-Z-]
fn is_valid_secret_name(name: &str) -> bool {
    (1..=127).contains(&name.len()) && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl TypedBackendConfig for AzureKeyVaultConfig {
    const BACKEND_TYPE: BackendType = BackendType::AzureKeyVault;

    fn backend_type(&self) -> BackendType {
        self.backend_type
    }

    fn validate(&self) -> Result<(), String> {
        let url = Url::parse(&self.keyvaulturl)
            .map_err(|e| format!("`keyvaulturl` is not a valid URL: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(format!(
                "`keyvaulturl` must be an http(s) URL with a host, got '{}'",
                self.keyvaulturl
            ));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(format!(
                "`keyvaulturl` must not carry a query or fragment, got '{}'",
                self.keyvaulturl
            ));
        }

        if !is_valid_secret_name(&self.secret_id) {
            return Err(format!(
                "`secret_id` must be 1-127 characters of letters, digits and '-', got '{}'",
                self.secret_id
            ));
        }

        if let Some(version) = &self.secret_version
            && (version.is_empty() || !version.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err(format!(
                "`secret_version` must be alphanumeric, got '{version}'"
            ));
        }

        Ok(())
    }
}

/// One `GetSecret` call for the configured secret
struct GetSecret<'a> {
    client: &'a KeyVaultClient,
    config: &'a AzureKeyVaultConfig,
}

#[async_trait]
impl SecretSource for GetSecret<'_> {
    async fn fetch_secret(&self, context: &DiagnosticContext) -> Result<SecureSecret, BackendError> {
        match self
            .client
            .get_secret(&self.config.secret_id, self.config.secret_version.as_deref())
            .await
        {
            Ok(value) => Ok(SecureSecret::new(value)),
            Err(KeyVaultError::NoValue) => Err(BackendError::Parse {
                backend_id: context.backend_id.clone(),
                secret_id: context.secret_id.clone(),
                message: KeyVaultError::NoValue.to_string(),
            }),
            Err(e) => Err(BackendError::Fetch {
                backend_id: context.backend_id.clone(),
                secret_id: context.secret_id.clone(),
                message: e.to_string(),
            }),
        }
    }
}

/// A backend bound to one Azure Key Vault secret
pub struct AzureKeyVaultBackend {
    config: AzureKeyVaultConfig,
    client: KeyVaultClient,
    context: DiagnosticContext,
    document: SecretDocument,
}

impl std::fmt::Debug for AzureKeyVaultBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureKeyVaultBackend")
            .field("backend_id", &self.context.backend_id)
            .field("keyvaulturl", &self.config.keyvaulturl)
            .field("secret_id", &self.config.secret_id)
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

impl AzureKeyVaultBackend {
    /// Decode the configuration, sign in and fetch the secret document.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::ConfigDecode`], [`BackendError::SessionInit`],
    /// [`BackendError::Fetch`] or [`BackendError::Parse`]; each is recorded on
    /// `sink` first.
    pub async fn new(
        backend_id: &str,
        raw: &RawBackendConfig,
        sink: &dyn DiagnosticSink,
    ) -> Result<Self, BackendError> {
        let config: AzureKeyVaultConfig = decode_config(backend_id, raw).inspect_err(|err| {
            sink.record(
                &Diagnostic::new(
                    DiagnosticLevel::Error,
                    events::CONFIG_INVALID,
                    "failed to decode backend configuration",
                    backend_id,
                )
                .with_backend_type(BackendType::AzureKeyVault)
                .with_error(err),
            );
        })?;

        let context = config.diagnostic_context(backend_id);
        let record_session_failure = |err: &BackendError| {
            sink.record(
                &context
                    .diagnostic(
                        DiagnosticLevel::Error,
                        events::SESSION_FAILED,
                        "failed to initialize Azure session",
                    )
                    .with_error(err),
            );
        };

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| BackendError::SessionInit {
                backend_id: backend_id.to_string(),
                message: format!("failed to build HTTP client: {e}"),
            })
            .inspect_err(record_session_failure)?;

        let session = session::new_azure_session(backend_id, &config.azure_session, &http)
            .await
            .inspect_err(record_session_failure)?;

        let client = KeyVaultClient::new(http, session, &config.keyvaulturl);

        let document = load_document(
            &GetSecret {
                client: &client,
                config: &config,
            },
            &context,
            sink,
        )
        .await?;

        Ok(Self {
            config,
            client,
            context,
            document,
        })
    }

    /// The decoded configuration.
    #[must_use]
    pub const fn config(&self) -> &AzureKeyVaultConfig {
        &self.config
    }

    /// The Key Vault client this backend was built with.
    #[must_use]
    pub const fn client(&self) -> &KeyVaultClient {
        &self.client
    }
}

impl SecretBackend for AzureKeyVaultBackend {
    fn context(&self) -> &DiagnosticContext {
        &self.context
    }

    fn document(&self) -> &SecretDocument {
        &self.document
    }
}
