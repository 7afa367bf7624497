//! Azure integration for vaultkey
//!
//! This crate provides the Azure Key Vault backend:
//! - [`session`]: OAuth2 client-credentials sign-in against Microsoft Entra ID
//! - [`client`]: the Key Vault secrets REST client
//! - [`secrets`]: fetches one secret document and serves key lookups

pub mod client;
pub mod secrets;
pub mod session;

// Re-export main types for convenience
pub use client::KeyVaultClient;
pub use secrets::{AzureKeyVaultBackend, AzureKeyVaultConfig};
pub use session::{AzureSession, AzureSessionConfig};
