// ── Core error types ──
//
// Errors raised by hub operations. Protocol-level failures are never
// surfaced through these types; the dispatcher turns them into `error`
// replies on the wire.

use strum::{AsRefStr, Display};
use thiserror::Error;

use crate::transport::ConnectionId;

/// Severity attached to a reported problem.
///
/// `Fatal` is reserved for the fail-safe path and is only ever raised
/// through [`Coordinator::raise_fatal`](crate::Coordinator::raise_fatal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum ErrorSeverity {
    Log,
    Warning,
    Error,
    Fatal,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Registration ─────────────────────────────────────────────────
    #[error("GUID {guid} is already registered")]
    GuidTaken { guid: String },

    #[error("GUID {guid} is reserved")]
    GuidReserved { guid: String },

    #[error("connection {connection} is already bound to a participant")]
    ConnectionTaken { connection: ConnectionId },
}

/// Failure to hand a payload to a single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("connection {0} is not open")]
    Unknown(ConnectionId),

    #[error("connection {0} has closed its outbound queue")]
    Closed(ConnectionId),

    #[error("connection {0} outbound queue is full")]
    Full(ConnectionId),
}
