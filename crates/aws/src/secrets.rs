//! AWS Secrets Manager backend

use crate::session;
use async_trait::async_trait;
use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use serde::Deserialize;
use vaultkey_secrets::diagnostics::events;
use vaultkey_secrets::{
    BackendError, BackendType, Diagnostic, DiagnosticContext, DiagnosticLevel, DiagnosticSink,
    RawBackendConfig, SecretBackend, SecretDocument, SecretSource, SecureSecret,
    TypedBackendConfig, decode_config, load_document,
};

/// Configuration for an AWS Secrets Manager backend
///
/// ```yaml
/// backend_type: aws.secretsmanager
/// secret_id: prod/db            # name or ARN
/// aws_region: us-east-1
/// aws_profile: default          # or aws_access_key_id + aws_secret_access_key
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsSecretsManagerConfig {
    /// Must be `aws.secretsmanager`
    pub backend_type: BackendType,

    /// Secret ID - can be ARN or secret name
    pub secret_id: String,

    /// Version ID (optional)
    #[serde(default)]
    pub version_id: Option<String>,

    /// Version stage (optional, defaults to AWSCURRENT)
    #[serde(default)]
    pub version_stage: Option<String>,

    /// Region; falls back to the profile/environment region
    #[serde(default)]
    pub aws_region: Option<String>,

    /// Named profile from the shared config files
    #[serde(default)]
    pub aws_profile: Option<String>,

    /// Static access key id
    #[serde(default)]
    pub aws_access_key_id: Option<String>,

    /// Static secret access key, required with `aws_access_key_id`
    #[serde(default)]
    pub aws_secret_access_key: Option<SecureSecret>,

    /// Session token for temporary static credentials
    #[serde(default)]
    pub aws_session_token: Option<SecureSecret>,

    /// Endpoint override (LocalStack, VPC endpoints)
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

impl AwsSecretsManagerConfig {
    /// Identifiers reported with every diagnostic of this backend.
    #[must_use]
    pub fn diagnostic_context(&self, backend_id: &str) -> DiagnosticContext {
        DiagnosticContext::new(backend_id, BackendType::AwsSecretsManager, &self.secret_id)
            .with_identifier("aws_region", self.aws_region.as_deref())
            .with_identifier("aws_profile", self.aws_profile.as_deref())
            .with_identifier("aws_access_key_id", self.aws_access_key_id.as_deref())
    }
}

impl TypedBackendConfig for AwsSecretsManagerConfig {
    const BACKEND_TYPE: BackendType = BackendType::AwsSecretsManager;

    fn backend_type(&self) -> BackendType {
        self.backend_type
    }

    fn validate(&self) -> Result<(), String> {
        if self.secret_id.trim().is_empty() {
            return Err("`secret_id` must not be empty".to_string());
        }

        if self.aws_region.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err("`aws_region` must not be empty when set".to_string());
        }

        match (&self.aws_access_key_id, &self.aws_secret_access_key) {
            (Some(_), None) => {
                return Err(
                    "`aws_access_key_id` requires `aws_secret_access_key`".to_string(),
                );
            }
            (None, Some(_)) => {
                return Err(
                    "`aws_secret_access_key` requires `aws_access_key_id`".to_string(),
                );
            }
            _ => {}
        }

        if self.aws_session_token.is_some() && self.aws_access_key_id.is_none() {
            return Err("`aws_session_token` requires `aws_access_key_id`".to_string());
        }

        if let Some(url) = &self.endpoint_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(format!("`endpoint_url` must be an http(s) URL, got '{url}'"));
        }

        Ok(())
    }
}

/// One `GetSecretValue` call for the configured secret
struct GetSecretValue<'a> {
    client: &'a Client,
    config: &'a AwsSecretsManagerConfig,
}

#[async_trait]
impl SecretSource for GetSecretValue<'_> {
    async fn fetch_secret(&self, context: &DiagnosticContext) -> Result<SecureSecret, BackendError> {
        let response = self
            .client
            .get_secret_value()
            .secret_id(&self.config.secret_id)
            .set_version_id(self.config.version_id.clone())
            .set_version_stage(self.config.version_stage.clone())
            .send()
            .await
            .map_err(|e| BackendError::Fetch {
                backend_id: context.backend_id.clone(),
                secret_id: context.secret_id.clone(),
                message: format!("AWS Secrets Manager error: {}", DisplayErrorContext(&e)),
            })?;

        let secret_string = response
            .secret_string()
            .ok_or_else(|| BackendError::Parse {
                backend_id: context.backend_id.clone(),
                secret_id: context.secret_id.clone(),
                message: "Secret has no string value (may be binary)".to_string(),
            })?;

        Ok(SecureSecret::new(secret_string.to_string()))
    }
}

/// A backend bound to one AWS Secrets Manager secret
///
/// The secret is fetched once by [`AwsSecretsManagerBackend::new`]; lookups
/// are served from memory.
pub struct AwsSecretsManagerBackend {
    config: AwsSecretsManagerConfig,
    client: Client,
    context: DiagnosticContext,
    document: SecretDocument,
}

impl std::fmt::Debug for AwsSecretsManagerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSecretsManagerBackend")
            .field("backend_id", &self.context.backend_id)
            .field("secret_id", &self.config.secret_id)
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

impl AwsSecretsManagerBackend {
    /// Decode the configuration, open a session and fetch the secret document.
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
        let config: AwsSecretsManagerConfig = decode_config(backend_id, raw).inspect_err(|err| {
            sink.record(
                &Diagnostic::new(
                    DiagnosticLevel::Error,
                    events::CONFIG_INVALID,
                    "failed to decode backend configuration",
                    backend_id,
                )
                .with_backend_type(BackendType::AwsSecretsManager)
                .with_error(err),
            );
        })?;

        let context = config.diagnostic_context(backend_id);

        let sdk_config = session::new_aws_config(backend_id, &config)
            .await
            .inspect_err(|err| {
                sink.record(
                    &context
                        .diagnostic(
                            DiagnosticLevel::Error,
                            events::SESSION_FAILED,
                            "failed to initialize aws session",
                        )
                        .with_error(err),
                );
            })?;
        let client = Client::new(&sdk_config);

        let document = load_document(
            &GetSecretValue {
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
    pub const fn config(&self) -> &AwsSecretsManagerConfig {
        &self.config
    }

    /// The Secrets Manager client this backend was built with.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }
}

impl SecretBackend for AwsSecretsManagerBackend {
    fn context(&self) -> &DiagnosticContext {
        &self.context
    }

    fn document(&self) -> &SecretDocument {
        &self.document
    }
}
