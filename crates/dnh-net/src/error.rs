use std::net::SocketAddr;

use thiserror::Error;

/// Top-level error type for the `dnh-net` crate.
///
/// Per-connection failures never surface here; they close only the
/// affected connection and are logged.
#[derive(Debug, Error)]
pub enum Error {
    /// A listener could not be bound.
    #[error("Failed to bind {role} listener on {addr}: {source}")]
    Bind {
        role: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// `start` was called while the servers were already up.
    #[error("Hub server is already running")]
    AlreadyRunning,

    /// A server is single-use; it cannot be restarted after shutdown.
    #[error("Hub server has been shut down")]
    ShutDown,

    /// Socket-level failure outside a single connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
