//! Length-prefixed framing.
//!
//! ```text
//! +----------------+------------------+
//! | length (4 BE)  |  JSON payload    |
//! +----------------+------------------+
//! ```
//!
//! The socket layers on both sides read the header first, validate it with
//! [`frame_len`], then read exactly that many payload bytes.

use serde::{Serialize, de::DeserializeOwned};

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Size of the big-endian length prefix.
pub const FRAME_HEADER_LEN: usize = 4;

/// Serializes `message` and prepends its length.
pub fn encode_message<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;
    let len = u32::try_from(json.len()).unwrap_or(u32::MAX);
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + json.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&json);
    Ok(frame)
}

/// Validates a frame header and returns the payload length it announces.
pub fn frame_len(header: [u8; FRAME_HEADER_LEN]) -> ProtocolResult<usize> {
    let len = u32::from_be_bytes(header);
    if len == 0 {
        return Err(ProtocolError::EmptyMessage);
    }
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(len as usize)
}

/// Decodes one complete frame (header plus payload).
pub fn decode_message<T: DeserializeOwned>(data: &[u8]) -> ProtocolResult<T> {
    let Some((header, rest)) = data.split_first_chunk::<FRAME_HEADER_LEN>() else {
        return Err(ProtocolError::IncompleteMessage {
            expected: FRAME_HEADER_LEN,
            received: data.len(),
        });
    };

    let len = frame_len(*header)?;
    let Some(payload) = rest.get(..len) else {
        return Err(ProtocolError::IncompleteMessage {
            expected: FRAME_HEADER_LEN + len,
            received: data.len(),
        });
    };

    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Envelope, Request, Response};

    #[test]
    fn header_matches_payload_length() {
        let envelope = Envelope::request("req-123", Request::Ping);
        let bytes = encode_message(&envelope).unwrap();
        let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(len as usize, bytes.len() - FRAME_HEADER_LEN);

        let decoded: Envelope<Request> = decode_message(&bytes).unwrap();
        assert_eq!(envelope, decoded);
    }

    #[test]
    fn short_header_is_incomplete() {
        let result: ProtocolResult<Envelope<Request>> = decode_message(&[0, 0]);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteMessage { expected: 4, .. })
        ));
    }

    #[test]
    fn short_payload_is_incomplete() {
        let mut data = vec![0, 0, 0, 100];
        data.extend_from_slice(&[b' '; 10]);
        let result: ProtocolResult<Envelope<Request>> = decode_message(&data);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteMessage { expected: 104, received: 14 })
        ));
    }

    #[test]
    fn oversized_header_rejected() {
        let header = (MAX_MESSAGE_SIZE + 1).to_be_bytes();
        assert!(matches!(
            frame_len(header),
            Err(ProtocolError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn zero_length_header_rejected() {
        assert!(matches!(frame_len([0; 4]), Err(ProtocolError::EmptyMessage)));
    }

    #[test]
    fn garbage_payload_is_serialization_error() {
        let mut data = 3u32.to_be_bytes().to_vec();
        data.extend_from_slice(b"{{{");
        let result: ProtocolResult<Envelope<Response>> = decode_message(&data);
        assert!(matches!(result, Err(ProtocolError::Serialization(_))));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let envelope = Envelope::response("r", Response::Pong);
        let mut bytes = encode_message(&envelope).unwrap();
        bytes.extend_from_slice(&encode_message(&Envelope::response("s", Response::Ok)).unwrap());
        let decoded: Envelope<Response> = decode_message(&bytes).unwrap();
        assert_eq!(decoded.request_id, "r");
    }
}
