use thiserror::Error;

/// Top-level error type for the `creskit-proto` crate.
///
/// Covers the link and codec failure modes. `creskit-core` maps these
/// into caller-facing diagnostics; most never reach a caller because the
/// connection loop recovers from them by reconnecting.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// Socket-level I/O failure (reset, broken pipe, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TCP connect to the controller failed.
    #[error("Cannot connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// A single connect attempt exceeded the configured timeout.
    #[error("Connect to {addr} timed out after {timeout_secs}s")]
    ConnectTimeout { addr: String, timeout_secs: u64 },

    /// Host/port pair that cannot be used as a peer address.
    #[error("Invalid peer address: {0}")]
    InvalidPeer(String),
}
