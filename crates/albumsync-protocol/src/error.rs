use thiserror::Error;

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Framing and encoding failures on either side of the socket.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Raised on encode as well as on a received header.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: u32, max: u32 },

    #[error("invalid JSON payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Fewer bytes were available than the frame header announced.
    #[error("incomplete message: expected {expected} bytes, got {received}")]
    IncompleteMessage { expected: usize, received: usize },

    #[error("empty message")]
    EmptyMessage,

    #[error("timeout during {operation}")]
    Timeout { operation: String },
}
