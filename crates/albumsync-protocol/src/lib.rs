//! IPC between the `albumsync` CLI and its daemon.
//!
//! Each message is a 4-byte big-endian length followed by a JSON
//! [`Envelope`]. Envelopes carry the protocol version, a request id used to
//! correlate the reply, and a [`Request`] or [`Response`] payload tagged by
//! `type`.
//!
//! ```rust
//! use albumsync_protocol::{Envelope, Request, encode_message, decode_message};
//!
//! let request = Envelope::request("req-1", Request::fetch_first_page(12));
//! let bytes = encode_message(&request).unwrap();
//! let decoded: Envelope<Request> = decode_message(&bytes).unwrap();
//! assert_eq!(decoded, request);
//! ```

mod error;
mod framing;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{decode_message, encode_message, frame_len, FRAME_HEADER_LEN};
pub use types::{Envelope, ErrorCode, ErrorResponse, Request, Response, StatusInfo};

pub const PROTOCOL_VERSION: &str = "1";

/// Upper bound on a single frame's payload (1 MiB).
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;
