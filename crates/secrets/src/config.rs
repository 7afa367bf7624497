//! Backend configuration: the raw mapping, the backend discriminator and typed decoding

use crate::BackendError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw backend configuration as read from a config file.
///
/// Values are plain strings for most fields; providers with nested settings
/// (e.g. `azure_session`) carry objects.
pub type RawBackendConfig = serde_json::Map<String, serde_json::Value>;

/// Key holding the backend discriminator in a [`RawBackendConfig`]
pub const BACKEND_TYPE_KEY: &str = "backend_type";

/// Supported provider variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendType {
    /// AWS Secrets Manager (`aws.secretsmanager`)
    #[serde(rename = "aws.secretsmanager")]
    AwsSecretsManager,
    /// Azure Key Vault (`azure.keyvault`)
    #[serde(rename = "azure.keyvault")]
    AzureKeyVault,
}

impl BackendType {
    /// Every supported variant, in declaration order.
    pub const ALL: [Self; 2] = [Self::AwsSecretsManager, Self::AzureKeyVault];

    /// The discriminator string used in configuration files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwsSecretsManager => "aws.secretsmanager",
            Self::AzureKeyVault => "azure.keyvault",
        }
    }

    /// Read the `backend_type` discriminator from a raw configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::ConfigDecode`] if the field is missing or not a
    /// string, and [`BackendError::UnsupportedBackend`] if it names no known
    /// provider.
    pub fn from_raw(backend_id: &str, raw: &RawBackendConfig) -> Result<Self, BackendError> {
        let value = raw
            .get(BACKEND_TYPE_KEY)
            .ok_or_else(|| BackendError::ConfigDecode {
                backend_id: backend_id.to_string(),
                message: format!("missing field `{BACKEND_TYPE_KEY}`"),
            })?;

        let name = value.as_str().ok_or_else(|| BackendError::ConfigDecode {
            backend_id: backend_id.to_string(),
            message: format!("`{BACKEND_TYPE_KEY}` must be a string"),
        })?;

        name.parse().map_err(|_| BackendError::UnsupportedBackend {
            backend_id: backend_id.to_string(),
            backend_type: name.to_string(),
        })
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown backend type: {s}"))
    }
}

/// A provider's typed configuration schema.
///
/// Implementors derive `Deserialize` with `deny_unknown_fields` so the serde
/// shape enumerates every accepted field; [`validate`](Self::validate) adds the
/// constraints serde cannot express.
pub trait TypedBackendConfig: DeserializeOwned {
    /// The variant this schema belongs to.
    const BACKEND_TYPE: BackendType;

    /// The discriminator found in the decoded configuration.
    fn backend_type(&self) -> BackendType;

    /// Check field constraints beyond the serde shape.
    ///
    /// # Errors
    ///
    /// Returns a human-readable description of the first violated constraint.
    fn validate(&self) -> Result<(), String>;
}

/// Decode and validate a raw configuration into a provider's typed schema.
///
/// # Errors
///
/// Returns [`BackendError::ConfigDecode`] on shape mismatch, on a
/// `backend_type` belonging to another provider, or on a failed
/// [`TypedBackendConfig::validate`].
pub fn decode_config<T: TypedBackendConfig>(
    backend_id: &str,
    raw: &RawBackendConfig,
) -> Result<T, BackendError> {
    let decode_error = |message: String| BackendError::ConfigDecode {
        backend_id: backend_id.to_string(),
        message,
    };

    let config: T = serde_path_to_error::deserialize(serde_json::Value::Object(raw.clone()))
        .map_err(|e| {
            let message = redact_decode_error(e.inner());
            match e.path().to_string().as_str() {
                "." => decode_error(message),
                path => decode_error(format!("`{path}`: {message}")),
            }
        })?;

    if config.backend_type() != T::BACKEND_TYPE {
        return Err(decode_error(format!(
            "`{BACKEND_TYPE_KEY}` is '{}', expected '{}'",
            config.backend_type(),
            T::BACKEND_TYPE
        )));
    }

    config.validate().map_err(decode_error)?;
    Ok(config)
}

/// Describe a decode failure without the offending value.
///
/// serde quotes the rejected value in type and variant mismatches, and that
/// value may be a credential.
fn redact_decode_error(err: &serde_json::Error) -> String {
    let message = err.to_string();
    let kind = ["invalid type", "invalid value", "unknown variant"]
        .into_iter()
        .find(|kind| message.starts_with(kind));

    match kind {
        Some(kind) => match message.rsplit_once(", expected ") {
            Some((_, expected)) => format!("{kind}, expected {expected}"),
            None => kind.to_string(),
        },
        None => message,
    }
}
