//! Error types for the transport layer.

/// Errors that can occur in the transport layer.
///
/// Connect failures are deliberately not represented as a dedicated
/// variant the caller must handle: the manager retries them on its timer
/// and only surfaces them through connection-state queries.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed or never became usable.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// A connection attempt could not be started.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// The target address could not be parsed or resolved.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
