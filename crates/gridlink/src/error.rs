//! Error types for the orchestration layer.

use gridlink_login::RpcError;
use gridlink_transport::TransportError;

use crate::settings::SettingsError;

/// Errors raised before a login attempt is even started.
///
/// Handshake failures never appear here — they are captured on the
/// session record and surfaced through polling and [`crate::LoginEvent`].
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    /// The server/authentication address did not survive URL validation.
    #[error("invalid server url \"{0}\"")]
    InvalidUrl(String),

    /// A direct login username must be exactly "first last".
    #[error("username \"{0}\" is not in \"first last\" form")]
    MalformedUsername(String),

    /// A required credential field was absent from the input map.
    #[error("missing credential field \"{0}\"")]
    MissingField(&'static str),
}

/// Top-level error that wraps all crate-specific errors.
///
/// Callers of the `gridlink` meta-crate deal with this single type; the
/// `#[from]` attributes let `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GridlinkError {
    /// A transport-level error (connect, send).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An RPC-level error (endpoint, reply fields).
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// A login orchestration error (validation, credentials).
    #[error(transparent)]
    Login(#[from] LoginError),

    /// A settings persistence error.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_login_error() {
        let err = LoginError::InvalidUrl("::".into());
        let top: GridlinkError = err.into();
        assert!(matches!(top, GridlinkError::Login(_)));
        assert!(top.to_string().contains("invalid server url"));
    }

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let top: GridlinkError = err.into();
        assert!(matches!(top, GridlinkError::Transport(_)));
    }

    #[test]
    fn test_from_rpc_error() {
        let err = RpcError::MissingField("session_id".into());
        let top: GridlinkError = err.into();
        assert!(matches!(top, GridlinkError::Rpc(_)));
        assert!(top.to_string().contains("session_id"));
    }
}
