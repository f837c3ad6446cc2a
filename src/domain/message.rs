// src/domain/message.rs

//! Application message envelope and its byte encoding.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::Result;

/// An application message.
///
/// Carries string headers and an opaque body. Sockets and clients encode it
/// with `serde_json` before publishing and decode it on receipt; the
/// encoding is lossless, so a received message compares equal to the one
/// that was sent.
///
/// ```
/// # use mom_socket::Message;
/// let msg = Message::new("ping").with_header("Content-Type", "text/plain");
/// assert_eq!(msg.header("Content-Type"), Some("text/plain"));
/// assert_eq!(&msg.body[..], b"ping");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    // ---
    /// Free-form string headers.
    #[serde(default)]
    pub header: HashMap<String, String>,

    /// Opaque payload.
    #[serde(default)]
    pub body: Bytes,
}

impl Message {
    /// Create a message with the given body and no headers.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            header: HashMap::new(),
            body: body.into(),
        }
    }

    /// Add or replace a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.insert(key.into(), value.into());
        self
    }

    /// Look up a header value.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.header.get(key).map(String::as_str)
    }
}

/// Encode a message into bus payload bytes.
pub(crate) fn encode(msg: &Message) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(msg)?))
}

/// Decode bus payload bytes into a message.
pub(crate) fn decode(payload: &[u8]) -> Result<Message> {
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::Error;

    #[test]
    fn test_encode_decode_preserves_headers_and_body() {
        // ---
        let msg = Message::new(vec![0u8, 159, 255, 10])
            .with_header("Micro-Method", "Greeter.Hello")
            .with_header("Content-Type", "application/octet-stream");

        let bytes = encode(&msg).unwrap();
        let back = decode(&bytes).unwrap();

        assert_eq!(back, msg);
    }

    #[test]
    fn test_decode_garbage_is_serialization_error() {
        // ---
        let err = decode(b"not json").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(!err.is_eof());
    }

    #[test]
    fn test_missing_fields_default() {
        // ---
        let msg = decode(b"{}").unwrap();
        assert!(msg.header.is_empty());
        assert!(msg.body.is_empty());
    }
}
