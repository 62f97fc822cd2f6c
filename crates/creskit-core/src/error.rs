// ── Core error types ──
//
// Caller-facing errors from creskit-core. Link failures are normally
// absorbed by the reconnect loop; the `From<creskit_proto::Error>` impl
// covers the few places they do surface (startup validation).

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to controller at {addr}: {reason}")]
    ConnectionFailed { addr: String, reason: String },

    #[error("Bridge is not connected")]
    Disconnected,

    // ── Request errors ───────────────────────────────────────────────
    #[error("No answer for {topic} after {attempts} retransmissions")]
    RequestExpired { topic: String, attempts: u32 },

    // ── Point errors ─────────────────────────────────────────────────
    #[error("Point not found: {kind} {id}")]
    PointNotFound { kind: String, id: String },

    #[error("{kind} does not support {operation}")]
    Unsupported { kind: String, operation: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from link-layer errors ────────────────────────────────

impl From<creskit_proto::Error> for CoreError {
    fn from(err: creskit_proto::Error) -> Self {
        match err {
            creskit_proto::Error::Connect { addr, reason } => {
                CoreError::ConnectionFailed { addr, reason }
            }
            creskit_proto::Error::ConnectTimeout { addr, timeout_secs } => {
                CoreError::ConnectionFailed {
                    addr,
                    reason: format!("timed out after {timeout_secs}s"),
                }
            }
            creskit_proto::Error::InvalidPeer(message) => CoreError::Config { message },
            creskit_proto::Error::Io(e) => CoreError::ConnectionFailed {
                addr: String::new(),
                reason: e.to_string(),
            },
        }
    }
}
