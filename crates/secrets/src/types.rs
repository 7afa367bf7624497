//! Secret value types
//!
//! This module provides:
//! - [`SecureSecret`]: A wrapper around `secrecy::SecretString` that auto-zeros on drop
//! - [`SecretOutput`]: The discriminated result of a lookup

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};

/// A secret value with automatic memory zeroing on drop.
///
/// This type wraps `secrecy::SecretString` to ensure:
/// - Secret values are zeroed from memory when dropped
/// - Debug output shows `[REDACTED]` instead of the actual value
/// - Explicit `.expose()` call required to access the value
#[derive(Clone)]
pub struct SecureSecret {
    inner: SecretString,
}

impl SecureSecret {
    /// Create a new secure secret from a string.
    ///
    /// The string value is moved into secure storage and will be
    /// automatically zeroed when this `SecureSecret` is dropped.
    #[must_use]
    pub fn new(value: String) -> Self {
        Self {
            inner: SecretString::from(value),
        }
    }

    /// Expose the secret value for use.
    ///
    /// The caller must ensure the exposed value is not logged or persisted.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.inner.expose_secret()
    }

    /// Get the length of the secret value without exposing it.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.expose_secret().len()
    }

    /// Check if the secret value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.expose_secret().is_empty()
    }
}

impl std::fmt::Debug for SecureSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl std::fmt::Display for SecureSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecureSecret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Result of a key lookup: a value or an error message, never both.
///
/// Serializes as `{"value": <string|null>, "error": <string|null>}`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SecretOutput {
    value: Option<String>,
    error: Option<String>,
}

impl SecretOutput {
    /// A successful lookup.
    #[must_use]
    pub fn from_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            error: None,
        }
    }

    /// A failed lookup.
    #[must_use]
    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            value: None,
            error: Some(error.into()),
        }
    }

    /// The secret value, if the lookup succeeded.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The error message, if the lookup failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the lookup produced a value.
    #[must_use]
    pub const fn is_value(&self) -> bool {
        self.value.is_some()
    }

    /// Convert into a `Result` of value or error message.
    ///
    /// # Errors
    ///
    /// Returns the error message if the lookup failed.
    pub fn into_result(self) -> Result<String, String> {
        match (self.value, self.error) {
            (Some(value), _) => Ok(value),
            (None, error) => Err(error.unwrap_or_default()),
        }
    }
}

impl std::fmt::Debug for SecretOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretOutput")
            .field("value", &self.value.as_ref().map(|_| "[REDACTED]"))
            .field("error", &self.error)
            .finish()
    }
}
