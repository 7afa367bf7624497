//! AWS session factory
//!
//! Turns the session fields of an [`AwsSecretsManagerConfig`] into an
//! `SdkConfig`. Credential precedence:
//! - `aws_access_key_id` + `aws_secret_access_key` (+ `aws_session_token`) → static credentials
//! - otherwise the default provider chain, scoped to `aws_profile` when set
//!
//! The SDK's retry policy is disabled; a failed call surfaces immediately.

use crate::secrets::AwsSecretsManagerConfig;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_smithy_http_client::{Builder, tls};
use vaultkey_secrets::BackendError;

/// Provider name reported for credentials taken from the backend configuration
const STATIC_CREDENTIALS_PROVIDER: &str = "vaultkey-static";

fn session_error(backend_id: &str, message: impl Into<String>) -> BackendError {
    BackendError::SessionInit {
        backend_id: backend_id.to_string(),
        message: message.into(),
    }
}

/// Build the SDK configuration for a backend and check that it is usable.
///
/// The configuration must resolve to a region, and its credentials provider
/// must yield credentials once; both are checked here so that a backend with
/// broken credentials fails before any secret is requested.
///
/// # Errors
///
/// Returns [`BackendError::SessionInit`] if no region can be resolved or the
/// credentials provider fails.
pub async fn new_aws_config(
    backend_id: &str,
    config: &AwsSecretsManagerConfig,
) -> Result<SdkConfig, BackendError> {
    let http_client = Builder::new()
        .tls_provider(tls::Provider::Rustls(
            tls::rustls_provider::CryptoMode::Ring,
        ))
        .build_https();

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .retry_config(RetryConfig::disabled())
        .http_client(http_client);

    if let Some(profile) = &config.aws_profile {
        loader = loader.profile_name(profile);
    }

    if let Some(region) = &config.aws_region {
        loader = loader.region(Region::new(region.clone()));
    }

    if let (Some(access_key_id), Some(secret_access_key)) =
        (&config.aws_access_key_id, &config.aws_secret_access_key)
    {
        loader = loader.credentials_provider(Credentials::new(
            access_key_id,
            secret_access_key.expose(),
            config
                .aws_session_token
                .as_ref()
                .map(|token| token.expose().to_string()),
            None,
            STATIC_CREDENTIALS_PROVIDER,
        ));
    }

    if let Some(endpoint_url) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint_url);
    }

    let sdk_config = loader.load().await;

    if sdk_config.region().is_none() {
        return Err(session_error(
            backend_id,
            "no AWS region configured; set `aws_region` or a region on the profile",
        ));
    }

    let provider = sdk_config
        .credentials_provider()
        .ok_or_else(|| session_error(backend_id, "no AWS credentials provider available"))?;

    provider.provide_credentials().await.map_err(|e| {
        session_error(
            backend_id,
            format!("failed to load AWS credentials: {}", DisplayErrorContext(&e)),
        )
    })?;

    Ok(sdk_config)
}
