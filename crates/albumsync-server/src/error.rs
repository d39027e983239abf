//! Server error types.

use std::io;

use albumsync_protocol::{ErrorCode, ErrorResponse, ProtocolError};
use albumsync_providers::{ProviderError, ProviderErrorCode};
use thiserror::Error;

use crate::store::StoreError;

pub type ServerResult<T> = Result<T, ServerError>;

/// Everything that can go wrong inside the daemon.
///
/// Only [`ServerError::to_response`] output crosses the socket.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("album store error: {0}")]
    Store(#[from] StoreError),

    #[error("album source error: {0}")]
    Provider(#[from] ProviderError),

    #[error("socket path already in use: {path}")]
    SocketInUse { path: String },

    #[error("socket path parent directory does not exist: {path}")]
    SocketPathInvalid { path: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Ends a connection loop once shutdown was requested.
    #[error("server shutdown requested")]
    Shutdown,
}

impl ServerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn socket_in_use(path: impl Into<String>) -> Self {
        Self::SocketInUse { path: path.into() }
    }

    pub fn socket_path_invalid(path: impl Into<String>) -> Self {
        Self::SocketPathInvalid { path: path.into() }
    }

    /// Wire form of this error for a client response.
    pub fn to_response(&self) -> ErrorResponse {
        match self {
            Self::Provider(e) => provider_error_response(e),
            Self::InvalidRequest(message) => ErrorResponse::invalid_request(message.clone()),
            Self::Shutdown => ErrorResponse::new(ErrorCode::ShuttingDown, "daemon is shutting down"),
            Self::Protocol(ProtocolError::Timeout { operation }) => {
                ErrorResponse::new(ErrorCode::Timeout, format!("timed out during {operation}"))
            }
            other => ErrorResponse::internal(other.to_string()),
        }
    }
}

/// Maps an album source failure onto the IPC error codes, keeping its message.
pub fn provider_error_response(error: &ProviderError) -> ErrorResponse {
    let code = match error.code() {
        ProviderErrorCode::AuthExpired => ErrorCode::AuthenticationFailed,
        ProviderErrorCode::Unavailable => ErrorCode::UpstreamUnavailable,
        ProviderErrorCode::Rejected => ErrorCode::UpstreamRejected,
        ProviderErrorCode::MalformedResponse => ErrorCode::MalformedResponse,
        ProviderErrorCode::NotFound => ErrorCode::NotFound,
        ProviderErrorCode::Configuration | ProviderErrorCode::Internal => ErrorCode::InternalError,
    };
    ErrorResponse::new(code, error.message())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_codes_map_to_wire_codes() {
        let cases = [
            (ProviderError::auth_expired("401"), ErrorCode::AuthenticationFailed),
            (ProviderError::unavailable("timeout"), ErrorCode::UpstreamUnavailable),
            (ProviderError::rejected(403, "quota"), ErrorCode::UpstreamRejected),
            (ProviderError::malformed("no id"), ErrorCode::MalformedResponse),
            (ProviderError::not_found("gone"), ErrorCode::NotFound),
            (ProviderError::configuration("no client id"), ErrorCode::InternalError),
        ];
        for (error, code) in cases {
            assert_eq!(provider_error_response(&error).code, code);
        }
    }

    #[test]
    fn rejected_message_is_verbatim() {
        let error = ProviderError::rejected(403, "The caller does not have permission");
        let response = ServerError::from(error).to_response();
        assert_eq!(response.code, ErrorCode::UpstreamRejected);
        assert_eq!(response.message, "The caller does not have permission");
    }

    #[test]
    fn store_errors_are_internal() {
        let response = ServerError::from(StoreError::UnknownAlbum(3)).to_response();
        assert_eq!(response.code, ErrorCode::InternalError);
        assert!(response.message.contains("local id 3"));
    }
}
