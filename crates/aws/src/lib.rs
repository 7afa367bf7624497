//! AWS integration for vaultkey
//!
//! This crate provides the AWS Secrets Manager backend:
//! - [`session`]: builds the SDK configuration from backend settings
//! - [`secrets`]: fetches one secret document and serves key lookups

pub mod secrets;
pub mod session;

// Re-export main types for convenience
pub use secrets::{AwsSecretsManagerBackend, AwsSecretsManagerConfig};
