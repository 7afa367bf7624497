//! Secret helper protocol
//!
//! The caller writes one JSON request to stdin:
//!
//! ```json
//! {"version": "1.0", "secrets": ["prod-db:db_password", "app:api_key"]}
//! ```
//!
//! and reads one JSON object mapping every requested handle to a
//! [`SecretOutput`]:
//!
//! ```json
//! {"app:api_key": {"value": "...", "error": null},
//!  "prod-db:db_password": {"value": null, "error": "backend does not provide secret key"}}
//! ```

use crate::config::ConfigFile;
use crate::error::Error;
use crate::registry::BackendRegistry;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use vaultkey_secrets::{DiagnosticSink, SecretBackend, SecretOutput};

/// The only protocol version understood
pub const PROTOCOL_VERSION: &str = "1.0";

/// Error for handles not of the form `<backend_id>:<secret_key>`
pub const INVALID_HANDLE_MESSAGE: &str = "invalid secret handle";

/// Error for handles naming a backend absent from the configuration
pub const BACKEND_NOT_CONFIGURED_MESSAGE: &str = "backend not configured";

/// A helper request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Request {
    /// Protocol version, must be [`PROTOCOL_VERSION`]
    pub version: String,
    /// Handles to resolve
    pub secrets: Vec<String>,
}

impl Request {
    /// Parse and version-check a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestParse`] on malformed JSON and
    /// [`Error::UnsupportedVersion`] on any version but [`PROTOCOL_VERSION`].
    pub fn from_json(input: &str) -> Result<Self, Error> {
        let request: Self =
            serde_json::from_str(input).map_err(|source| Error::RequestParse { source })?;

        if request.version != PROTOCOL_VERSION {
            return Err(Error::UnsupportedVersion {
                version: request.version,
            });
        }
        Ok(request)
    }
}

/// Handle → lookup result, ordered by handle
pub type Response = BTreeMap<String, SecretOutput>;

/// A parsed `<backend_id>:<secret_key>` handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretHandle<'a> {
    /// Backend the key lives in
    pub backend_id: &'a str,
    /// Key within the backend's document
    pub secret_key: &'a str,
}

impl<'a> SecretHandle<'a> {
    /// Split a handle on its first `:`.
    ///
    /// Returns `None` when there is no `:` or either side is empty.
    #[must_use]
    pub fn parse(handle: &'a str) -> Option<Self> {
        let (backend_id, secret_key) = handle.split_once(':')?;
        if backend_id.is_empty() || secret_key.is_empty() {
            return None;
        }
        Some(Self {
            backend_id,
            secret_key,
        })
    }
}

/// Answer every handle in `request`.
///
/// Only the configured backends the request references are constructed, all
/// of them concurrently. A backend that fails to construct answers each of
/// its handles with the construction error.
pub async fn resolve(request: &Request, config: &ConfigFile, sink: &dyn DiagnosticSink) -> Response {
    let referenced: BTreeSet<&str> = request
        .secrets
        .iter()
        .filter_map(|handle| SecretHandle::parse(handle))
        .map(|handle| handle.backend_id)
        .collect();

    let mut registry = BackendRegistry::new();
    let failures = registry
        .create_all(
            referenced
                .iter()
                .filter_map(|id| config.backend(id).map(|raw| (*id, raw))),
            sink,
        )
        .await;

    request
        .secrets
        .iter()
        .map(|handle| {
            let output = match SecretHandle::parse(handle) {
                None => SecretOutput::from_error(INVALID_HANDLE_MESSAGE),
                Some(parsed) => match registry.resolve(parsed.backend_id) {
                    Some(backend) => backend.get_secret_output(parsed.secret_key, sink),
                    None => failures.get(parsed.backend_id).map_or_else(
                        || SecretOutput::from_error(BACKEND_NOT_CONFIGURED_MESSAGE),
                        |err| SecretOutput::from_error(err.to_string()),
                    ),
                },
            };
            (handle.clone(), output)
        })
        .collect()
}

/// Parse a request, resolve it and serialize the response.
///
/// # Errors
///
/// Returns request parse/version errors and [`Error::ResponseSerialize`].
pub async fn respond(input: &str, config: &ConfigFile, sink: &dyn DiagnosticSink) -> Result<String, Error> {
    let request = Request::from_json(input)?;

    tracing::debug!(
        target: "vaultkey::cli",
        handles = request.secrets.len(),
        "resolving request"
    );

    let response = resolve(&request, config, sink).await;
    serde_json::to_string(&response).map_err(|source| Error::ResponseSerialize { source })
}
