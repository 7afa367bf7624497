//! Configuration file
//!
//! ```yaml
//! backends:
//!   prod-db:
//!     backend_type: aws.secretsmanager
//!     secret_id: prod/db
//!     aws_region: us-east-1
//! ```

use crate::error::Error;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use vaultkey_secrets::RawBackendConfig;

/// File name looked up next to the executable when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "vaultkey.yaml";

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "VAULTKEY_CONFIG";

/// Parsed configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Raw backend configurations keyed by backend id
    #[serde(default)]
    pub backends: BTreeMap<String, RawBackendConfig>,
}

impl ConfigFile {
    /// Parse a configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] if the text is not a valid configuration.
    pub fn from_yaml(path: &Path, text: &str) -> Result<Self, Error> {
        // An empty file is an empty configuration
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and parse the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigRead`] if the file cannot be read and
    /// [`Error::ConfigParse`] if it is not a valid configuration.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(path, &text)?;

        tracing::debug!(
            target: "vaultkey::cli",
            path = %path.display(),
            backends = config.backends.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Raw configuration of one backend.
    #[must_use]
    pub fn backend(&self, backend_id: &str) -> Option<&RawBackendConfig> {
        self.backends.get(backend_id)
    }
}

/// `vaultkey.yaml` in the directory of the running executable.
///
/// # Errors
///
/// Returns [`Error::ConfigLocate`] if the executable path is unavailable.
pub fn default_config_path() -> Result<PathBuf, Error> {
    let exe = std::env::current_exe().map_err(|source| Error::ConfigLocate { source })?;
    Ok(exe
        .parent()
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), |dir| dir.join(DEFAULT_CONFIG_FILE)))
}

/// The configuration path to use: `explicit` when given, else the default.
///
/// # Errors
///
/// Returns [`Error::ConfigLocate`] if the default path cannot be determined.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, Error> {
    explicit.map_or_else(default_config_path, |path| Ok(path.to_path_buf()))
}
