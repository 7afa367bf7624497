//! Minimal Key Vault data-plane client
//!
//! Only `GET {vault}/secrets/{name}[/{version}]` is needed.

use crate::session::AzureSession;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

/// Key Vault REST API version
pub const API_VERSION: &str = "7.4";

/// Errors from a Key Vault request
#[derive(Debug, Error)]
pub enum KeyVaultError {
    /// The request never produced a response
    #[error("request to Key Vault failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Key Vault answered with an error status
    #[error("Key Vault returned HTTP {status} ({code}): {message}")]
    Status {
        /// HTTP status
        status: StatusCode,
        /// Key Vault error code, e.g. `SecretNotFound`
        code: String,
        /// Key Vault error message
        message: String,
    },

    /// The response carried no secret value
    #[error("Key Vault response has no secret value")]
    NoValue,
}

#[derive(Deserialize)]
struct SecretBundle {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Key Vault client bound to one vault and one session
#[derive(Debug)]
pub struct KeyVaultClient {
    http: Client,
    session: AzureSession,
    vault_url: String,
}

impl KeyVaultClient {
    /// Create a client for `vault_url`, e.g. `https://myvault.vault.azure.net`.
    #[must_use]
    pub fn new(http: Client, session: AzureSession, vault_url: &str) -> Self {
        Self {
            http,
            session,
            vault_url: vault_url.trim_end_matches('/').to_string(),
        }
    }

    /// The vault this client talks to.
    #[must_use]
    pub fn vault_url(&self) -> &str {
        &self.vault_url
    }

    /// The session whose token authorizes requests.
    #[must_use]
    pub const fn session(&self) -> &AzureSession {
        &self.session
    }

    /// URL of a secret, pinned to `version` when given.
    #[must_use]
    pub fn secret_url(&self, name: &str, version: Option<&str>) -> String {
        match version {
            Some(version) => format!("{}/secrets/{name}/{version}", self.vault_url),
            None => format!("{}/secrets/{name}", self.vault_url),
        }
    }

    /// Fetch a secret's value.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError`] on transport failure, a non-success status,
    /// or a response without a value.
    pub async fn get_secret(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<String, KeyVaultError> {
        let response = self
            .http
            .get(self.secret_url(name, version))
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(self.session.bearer_token())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let (code, message) = match response.json::<ErrorBody>().await {
                Ok(body) => (body.error.code, body.error.message),
                Err(_) => (String::from("Unknown"), status.to_string()),
            };
            return Err(KeyVaultError::Status {
                status,
                code,
                message,
            });
        }

        let bundle: SecretBundle = response.json().await?;
        bundle.value.ok_or(KeyVaultError::NoValue)
    }
}
