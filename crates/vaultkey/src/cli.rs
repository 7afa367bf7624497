//! Command-line interface

use crate::config::{self, CONFIG_ENV, ConfigFile};
use crate::error::Error;
use crate::protocol;
use crate::tracing::{LogLevel, TracingConfig, TracingFormat};
use clap::Parser;
use std::path::PathBuf;
use vaultkey_secrets::DiagnosticSink;

/// Resolve `<backend_id>:<secret_key>` handles read from stdin
#[derive(Debug, Parser)]
#[command(name = "vaultkey", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to vaultkey.yaml next to the executable)
    #[arg(long, short = 'c', env = CONFIG_ENV, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level for vaultkey crates when RUST_LOG is unset
    #[arg(long, short = 'l', value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Log output format (always written to stderr)
    #[arg(long, value_enum, default_value_t = TracingFormat::Compact)]
    pub log_format: TracingFormat,
}

impl Cli {
    /// Tracing configuration selected by the flags.
    #[must_use]
    pub fn tracing_config(&self) -> TracingConfig {
        TracingConfig {
            format: self.log_format,
            level: self.log_level.into(),
            filter: None,
        }
    }

    /// Load the configuration file selected by the flags.
    ///
    /// # Errors
    ///
    /// Returns the configuration locate, read or parse error.
    pub fn load_config(&self) -> Result<ConfigFile, Error> {
        let path = config::resolve_config_path(self.config.as_deref())?;
        ConfigFile::load(&path)
    }

    /// Answer one helper request.
    ///
    /// # Errors
    ///
    /// Returns configuration and request errors; per-handle failures are part
    /// of the response instead.
    pub async fn run(&self, input: &str, sink: &dyn DiagnosticSink) -> Result<String, Error> {
        let config = self.load_config()?;
        protocol::respond(input, &config, sink).await
    }
}
