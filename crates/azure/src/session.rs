//! Azure session factory
//!
//! Signs in with the OAuth2 client-credentials grant and keeps the resulting
//! Key Vault access token. Every setting may come from the backend's
//! `azure_session` block or, when absent there, from the environment:
//!
//! | Field | Environment |
//! |---|---|
//! | `azure_tenant_id` | `AZURE_TENANT_ID` |
//! | `azure_client_id` | `AZURE_CLIENT_ID` |
//! | `azure_client_secret` | `AZURE_CLIENT_SECRET` |
//! | `azure_authority_host` | `AZURE_AUTHORITY_HOST` |

use reqwest::Client;
use serde::Deserialize;
use vaultkey_secrets::{BackendError, SecureSecret};

/// Authority used when none is configured
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// OAuth2 scope granting access to Key Vault data-plane APIs
pub const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";

/// Credentials for the client-credentials grant
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AzureSessionConfig {
    /// Directory (tenant) id
    #[serde(default)]
    pub azure_tenant_id: Option<String>,

    /// Application (client) id
    #[serde(default)]
    pub azure_client_id: Option<String>,

    /// Client secret
    #[serde(default)]
    pub azure_client_secret: Option<SecureSecret>,

    /// Authority host, e.g. `https://login.microsoftonline.us`
    #[serde(default)]
    pub azure_authority_host: Option<String>,
}

impl AzureSessionConfig {
    fn setting(configured: Option<&str>, var: &str) -> Option<String> {
        configured
            .map(str::to_string)
            .or_else(|| std::env::var(var).ok())
            .filter(|value| !value.trim().is_empty())
    }

    /// Tenant id from the config or `AZURE_TENANT_ID`.
    #[must_use]
    pub fn tenant_id(&self) -> Option<String> {
        Self::setting(self.azure_tenant_id.as_deref(), "AZURE_TENANT_ID")
    }

    /// Client id from the config or `AZURE_CLIENT_ID`.
    #[must_use]
    pub fn client_id(&self) -> Option<String> {
        Self::setting(self.azure_client_id.as_deref(), "AZURE_CLIENT_ID")
    }

    /// Client secret from the config or `AZURE_CLIENT_SECRET`.
    #[must_use]
    pub fn client_secret(&self) -> Option<SecureSecret> {
        self.azure_client_secret
            .clone()
            .or_else(|| std::env::var("AZURE_CLIENT_SECRET").ok().map(SecureSecret::new))
            .filter(|secret| !secret.is_empty())
    }

    /// Authority host from the config, `AZURE_AUTHORITY_HOST`, or the public cloud.
    #[must_use]
    pub fn authority_host(&self) -> String {
        Self::setting(self.azure_authority_host.as_deref(), "AZURE_AUTHORITY_HOST")
            .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string())
    }
}

/// An authenticated Azure session holding a Key Vault access token
pub struct AzureSession {
    tenant_id: String,
    client_id: String,
    access_token: SecureSecret,
}

impl std::fmt::Debug for AzureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureSession")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("access_token", &self.access_token)
            .finish()
    }
}

impl AzureSession {
    /// Create a session from an already issued token.
    #[must_use]
    pub fn from_token(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        access_token: SecureSecret,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            access_token,
        }
    }

    /// Tenant the token was issued by.
    #[must_use]
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Client the token was issued to.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Bearer token for the `Authorization` header.
    #[must_use]
    pub fn bearer_token(&self) -> &str {
        self.access_token.expose()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

fn session_error(backend_id: &str, message: impl Into<String>) -> BackendError {
    BackendError::SessionInit {
        backend_id: backend_id.to_string(),
        message: message.into(),
    }
}

fn missing(backend_id: &str, field: &str, var: &str) -> BackendError {
    session_error(
        backend_id,
        format!("no Azure credential `{field}` configured (set it in `azure_session` or {var})"),
    )
}

/// Sign in with the client-credentials grant.
///
/// Performs a single token request; no retries.
///
/// # Errors
///
/// Returns [`BackendError::SessionInit`] if a credential is missing, the
/// token endpoint is unreachable or rejects the request, or the response has
/// no access token.
pub async fn new_azure_session(
    backend_id: &str,
    config: &AzureSessionConfig,
    http: &Client,
) -> Result<AzureSession, BackendError> {
    let tenant_id = config
        .tenant_id()
        .ok_or_else(|| missing(backend_id, "azure_tenant_id", "AZURE_TENANT_ID"))?;
    let client_id = config
        .client_id()
        .ok_or_else(|| missing(backend_id, "azure_client_id", "AZURE_CLIENT_ID"))?;
    let client_secret = config
        .client_secret()
        .ok_or_else(|| missing(backend_id, "azure_client_secret", "AZURE_CLIENT_SECRET"))?;

    let token_url = format!(
        "{}/{}/oauth2/v2.0/token",
        config.authority_host().trim_end_matches('/'),
        tenant_id
    );

    let response = http
        .post(&token_url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.expose()),
            ("scope", KEY_VAULT_SCOPE),
        ])
        .send()
        .await
        .map_err(|e| session_error(backend_id, format!("token request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response
            .json::<TokenErrorResponse>()
            .await
            .map(|e| e.error_description.unwrap_or(e.error))
            .unwrap_or_else(|_| status.to_string());
        return Err(session_error(
            backend_id,
            format!("token request rejected (HTTP {status}): {detail}"),
        ));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| session_error(backend_id, format!("invalid token response: {e}")))?;

    let access_token = token
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| session_error(backend_id, "token response has no access_token"))?;

    Ok(AzureSession::from_token(
        tenant_id,
        client_id,
        SecureSecret::new(access_token),
    ))
}
