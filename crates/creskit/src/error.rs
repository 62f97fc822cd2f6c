//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use creskit_config::ConfigError;
use creskit_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const CONNECTION: i32 = 4;
    pub const TIMEOUT: i32 = 5;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to controller at {addr}")]
    #[diagnostic(
        code(creskit::connection_failed),
        help(
            "Check that the controller program is running and its TCP server is reachable.\n\
             Reason: {reason}\n\
             Try: creskit --host <host> --port <port> points"
        )
    )]
    ConnectionFailed { addr: String, reason: String },

    #[error("Bridge is not connected")]
    #[diagnostic(code(creskit::disconnected))]
    Disconnected,

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("No answer from the controller after {seconds}s")]
    #[diagnostic(
        code(creskit::timeout),
        help("Increase the wait with --timeout, or check that the controller answers this get.")
    )]
    Timeout { seconds: u64 },

    #[error("No answer for {topic} after {attempts} retransmissions")]
    #[diagnostic(
        code(creskit::request_expired),
        help("Raise or remove max_retries in the config file.")
    )]
    RequestExpired { topic: String, attempts: u32 },

    // ── Points ───────────────────────────────────────────────────────

    #[error("{kind} '{id}' is not configured")]
    #[diagnostic(
        code(creskit::not_found),
        help("Run: creskit points to see configured points")
    )]
    NotFound { kind: String, id: String },

    #[error("{kind} does not support {operation}")]
    #[diagnostic(
        code(creskit::unsupported),
        help("Run: creskit points to see what each point can read and write")
    )]
    Unsupported { kind: String, operation: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(creskit::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Invalid configuration: {field}: {reason}")]
    #[diagnostic(
        code(creskit::config_invalid),
        help(
            "Check {path}, or override with --host / --port.\n\
             Create a starter file with: creskit config init"
        )
    )]
    ConfigInvalid {
        field: String,
        reason: String,
        path: String,
    },

    #[error("Could not load configuration from {path}")]
    #[diagnostic(code(creskit::config))]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(code(creskit::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    // ── Internal / IO / Serialization ────────────────────────────────

    #[error("Internal error: {0}")]
    #[diagnostic(code(creskit::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON output: {0}")]
    #[diagnostic(code(creskit::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Wrap a config-layer error, keeping the file it came from.
    pub fn from_config(err: ConfigError, path: &std::path::Path) -> Self {
        let path = path.display().to_string();
        match err {
            ConfigError::Validation { field, reason } => Self::ConfigInvalid {
                field,
                reason,
                path,
            },
            source => Self::Config { path, source },
        }
    }

    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Disconnected => exit_code::CONNECTION,
            Self::Timeout { .. } | Self::RequestExpired { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::Unsupported { .. } => exit_code::USAGE,
            Self::ConfigInvalid { .. } | Self::Config { .. } | Self::ConfigExists { .. } => {
                exit_code::CONFIG
            }
            Self::NotFound { .. } | Self::Internal(_) | Self::Io(_) | Self::Json(_) => {
                exit_code::GENERAL
            }
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { addr, reason } => {
                CliError::ConnectionFailed { addr, reason }
            }
            CoreError::Disconnected => CliError::Disconnected,
            CoreError::RequestExpired { topic, attempts } => {
                CliError::RequestExpired { topic, attempts }
            }
            CoreError::PointNotFound { kind, id } => CliError::NotFound { kind, id },
            CoreError::Unsupported { kind, operation } => {
                CliError::Unsupported { kind, operation }
            }
            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "value".into(),
                reason: message,
            },
            CoreError::Config { message } => CliError::ConfigInvalid {
                field: "config".into(),
                reason: message,
                path: creskit_config::config_path().display().to_string(),
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        assert_eq!(
            CliError::from(CoreError::Disconnected).exit_code(),
            exit_code::CONNECTION
        );
        assert_eq!(
            CliError::Timeout { seconds: 3 }.exit_code(),
            exit_code::TIMEOUT
        );
        assert_eq!(
            CliError::from(CoreError::ValidationFailed {
                message: "2 is out of range".into()
            })
            .exit_code(),
            exit_code::USAGE
        );
        assert_eq!(
            CliError::from_config(
                ConfigError::Validation {
                    field: "host".into(),
                    reason: "not set".into()
                },
                std::path::Path::new("/tmp/config.toml")
            )
            .exit_code(),
            exit_code::CONFIG
        );
    }
}
