//! Client error types.

use albumsync_protocol::ErrorResponse;
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Daemon not reachable over its socket.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// The daemon answered with an error response.
    #[error("{0}")]
    Server(ErrorResponse),

    /// The daemon answered with a response type the request does not expect.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Browsing stopped before a single page could be shown.
    #[error("failed to load albums: {0}")]
    Browse(String),

    /// A page load or bulk import is already running on this driver.
    #[error("busy: {0}")]
    Busy(String),

    #[error("daemon error: {0}")]
    Daemon(#[from] albumsync_server::ServerError),
}

impl ClientError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<albumsync_protocol::ProtocolError> for ClientError {
    fn from(err: albumsync_protocol::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<albumsync_providers::ProviderError> for ClientError {
    fn from(err: albumsync_providers::ProviderError) -> Self {
        Self::Provider(err.to_string())
    }
}

impl From<albumsync_server::StoreError> for ClientError {
    fn from(err: albumsync_server::StoreError) -> Self {
        Self::Daemon(err.into())
    }
}
