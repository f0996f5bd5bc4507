//! CLI error types with miette diagnostics.

use std::net::SocketAddr;

use miette::Diagnostic;
use thiserror::Error;

use dnh_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const BIND: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(dnh::no_config),
        help("Pass an existing file with --config, or omit it to use ./config.json when present.")
    )]
    NoConfig { path: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(dnh::validation))]
    Validation { field: String, reason: String },

    #[error("{count} param definition(s) were rejected")]
    #[diagnostic(
        code(dnh::params),
        help("Each rejected entry is listed above. Fix the definitions under `params`.")
    )]
    InvalidParams { count: usize },

    #[error(transparent)]
    #[diagnostic(code(dnh::config))]
    Config(Box<ConfigError>),

    // ── Server ───────────────────────────────────────────────────────
    #[error("Could not bind the {role} listener on {addr}")]
    #[diagnostic(
        code(dnh::bind),
        help(
            "Another process may already be using that port.\n\
             Pick a different one with --http-port / --ws-port or in the config file."
        )
    )]
    Bind {
        role: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(dnh::server))]
    Server(dnh_net::Error),

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            Self::InvalidParams { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::Bind { .. } => exit_code::BIND,
            Self::Server(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => Self::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

impl From<dnh_net::Error> for CliError {
    fn from(err: dnh_net::Error) -> Self {
        match err {
            dnh_net::Error::Bind { role, addr, source } => Self::Bind { role, addr, source },
            other => Self::Server(other),
        }
    }
}
