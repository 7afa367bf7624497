//! Application errors
//!
//! Backend failures are reported per handle inside the helper response; the
//! errors here abort a run before a response can be produced.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code when a response was written
pub const EXIT_OK: i32 = 0;
/// Exit code for configuration and request errors
pub const EXIT_CLI: i32 = 2;

/// Errors that abort a helper run
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// The configuration file could not be read
    #[error("Failed to read configuration file {}", path.display())]
    #[diagnostic(
        code(vaultkey::config::read),
        help("Pass --config <path> or set VAULTKEY_CONFIG")
    )]
    ConfigRead {
        /// Path that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML of the expected shape
    #[error("Invalid configuration file {}", path.display())]
    #[diagnostic(
        code(vaultkey::config::parse),
        help("The file must contain a `backends` mapping of backend id to backend settings")
    )]
    ConfigParse {
        /// Path that was parsed
        path: PathBuf,
        /// Underlying YAML error
        #[source]
        source: serde_yaml::Error,
    },

    /// The default configuration path could not be determined
    #[error("Failed to locate the default configuration file")]
    #[diagnostic(
        code(vaultkey::config::locate),
        help("Pass --config <path> or set VAULTKEY_CONFIG")
    )]
    ConfigLocate {
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The request could not be read from stdin
    #[error("Failed to read request")]
    #[diagnostic(code(vaultkey::protocol::read))]
    RequestRead {
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The request is not valid JSON of the expected shape
    #[error("Invalid request")]
    #[diagnostic(
        code(vaultkey::protocol::request),
        help(r#"Expected {{"version": "1.0", "secrets": ["<backend_id>:<secret_key>", ...]}}"#)
    )]
    RequestParse {
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The request names a protocol version this binary does not speak
    #[error("Unsupported protocol version '{version}'")]
    #[diagnostic(code(vaultkey::protocol::version), help("Supported version: 1.0"))]
    UnsupportedVersion {
        /// Version from the request
        version: String,
    },

    /// The response could not be written
    #[error("Failed to write response")]
    #[diagnostic(code(vaultkey::protocol::write))]
    ResponseWrite {
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The response could not be serialized
    #[error("Failed to serialize response")]
    #[diagnostic(code(vaultkey::protocol::serialize))]
    ResponseSerialize {
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The async runtime could not be started
    #[error("Failed to start async runtime")]
    #[diagnostic(code(vaultkey::cli::runtime))]
    Runtime {
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Logging could not be set up
    #[error("Failed to initialize tracing: {message}")]
    #[diagnostic(
        code(vaultkey::cli::tracing),
        help("Check RUST_LOG and the --log-level/--log-format flags")
    )]
    Tracing {
        /// What went wrong
        message: String,
    },
}

impl Error {
    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        EXIT_CLI
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_error_exits_with_cli_code() {
        let errors = [
            Error::UnsupportedVersion {
                version: "2.0".to_string(),
            },
            Error::Tracing {
                message: "bad filter".to_string(),
            },
            Error::ConfigRead {
                path: PathBuf::from("/nonexistent/vaultkey.yaml"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            },
        ];
        for err in errors {
            assert_eq!(err.exit_code(), EXIT_CLI);
        }
    }

    #[test]
    fn test_diagnostic_codes() {
        let err = Error::UnsupportedVersion {
            version: "2.0".to_string(),
        };
        assert_eq!(
            err.code().map(|c| c.to_string()).as_deref(),
            Some("vaultkey::protocol::version")
        );
        assert_eq!(err.to_string(), "Unsupported protocol version '2.0'");
    }

    #[test]
    fn test_config_read_mentions_path() {
        let err = Error::ConfigRead {
            path: PathBuf::from("/etc/vaultkey.yaml"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("/etc/vaultkey.yaml"));
        assert!(err.help().is_some());
    }
}
