//! The frame codec.
//!
//! A [`Frame`] is the only unit two peers exchange once a call is set up.
//! Frames are encoded as a protobuf message with a single `oneof`:
//!
//! ```text
//! message Data {
//!   oneof type {
//!     bytes  raw       = 1;
//!     string final     = 2;
//!     bool   ping_pong = 3;
//!   }
//! }
//! ```
//!
//! # Example
//!
//! ```rust
//! use raas_core::frame::Frame;
//!
//! let frame = Frame::raw(&b"hello"[..]);
//! let bytes = frame.encode();
//! assert_eq!(Frame::decode(&bytes).unwrap(), frame);
//! ```

use bytes::Bytes;
use prost::Message as _;

use crate::error::{RaasError, Result};

/// Terminal message an output publisher sends when it is torn down
/// before its sequence ended.
pub const DISPOSE_MESSAGE: &str = "dispose";

/// A single protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One chunk of stream data.
    Raw(Bytes),
    /// Terminal signal for one direction of a call.
    ///
    /// An empty message means normal completion; anything else is the
    /// error description.
    Final(String),
    /// Liveness probe (`true`) or its reply (`false`).
    PingPong(bool),
}

impl Frame {
    /// Create a data frame.
    pub fn raw(chunk: impl Into<Bytes>) -> Self {
        Self::Raw(chunk.into())
    }

    /// The terminal frame for normal completion.
    #[must_use]
    pub const fn complete() -> Self {
        Self::Final(String::new())
    }

    /// A terminal frame carrying an error description.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Final(message.into())
    }

    /// The terminal frame for a cancelled publisher.
    #[must_use]
    pub fn dispose() -> Self {
        Self::Final(DISPOSE_MESSAGE.to_string())
    }

    /// A liveness probe.
    #[must_use]
    pub const fn ping() -> Self {
        Self::PingPong(true)
    }

    /// The reply to a liveness probe.
    #[must_use]
    pub const fn pong() -> Self {
        Self::PingPong(false)
    }

    /// Whether this frame terminates its direction.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Final(_))
    }

    /// Short name of the variant, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Raw(_) => "raw",
            Self::Final(_) => "final",
            Self::PingPong(true) => "ping",
            Self::PingPong(false) => "pong",
        }
    }

    /// Encode the frame into its wire form.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let kind = match self {
            Self::Raw(chunk) => wire::Kind::Raw(chunk.clone()),
            Self::Final(message) => wire::Kind::Final(message.clone()),
            Self::PingPong(is_ping) => wire::Kind::PingPong(*is_ping),
        };
        Bytes::from(wire::Data { kind: Some(kind) }.encode_to_vec())
    }

    /// Decode a frame from its wire form.
    ///
    /// Fails with [`RaasError::MalformedFrame`] if the bytes are not a
    /// protobuf `Data` message or carry none of the three variants.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let data = wire::Data::decode(buf).map_err(|e| RaasError::MalformedFrame {
            message: format!("undecodable frame of {} bytes", buf.len()),
            source: Some(Box::new(e)),
        })?;

        match data.kind {
            Some(wire::Kind::Raw(chunk)) => Ok(Self::Raw(chunk)),
            Some(wire::Kind::Final(message)) => Ok(Self::Final(message)),
            Some(wire::Kind::PingPong(is_ping)) => Ok(Self::PingPong(is_ping)),
            None => Err(RaasError::malformed_frame("frame carries no variant")),
        }
    }
}

mod wire {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Data {
        #[prost(oneof = "Kind", tags = "1, 2, 3")]
        pub kind: Option<Kind>,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        #[prost(bytes = "bytes", tag = "1")]
        Raw(::prost::bytes::Bytes),
        #[prost(string, tag = "2")]
        Final(String),
        #[prost(bool, tag = "3")]
        PingPong(bool),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_all_variants() {
        let frames = [
            Frame::raw(&b"chunk"[..]),
            Frame::raw(Bytes::new()),
            Frame::complete(),
            Frame::error("handler failed"),
            Frame::dispose(),
            Frame::ping(),
            Frame::pong(),
        ];

        for frame in frames {
            let decoded = Frame::decode(&frame.encode()).unwrap();
            assert_eq!(decoded, frame);
        }
    }

    #[test]
    fn test_wire_layout_matches_schema() {
        // field 1, length-delimited
        assert_eq!(&Frame::raw(&b"ab"[..]).encode()[..], &[0x0a, 0x02, b'a', b'b']);
        // field 2, empty string is still present inside the oneof
        assert_eq!(&Frame::complete().encode()[..], &[0x12, 0x00]);
        // field 3, varint
        assert_eq!(&Frame::ping().encode()[..], &[0x18, 0x01]);
        assert_eq!(&Frame::pong().encode()[..], &[0x18, 0x00]);
    }

    #[test]
    fn test_empty_message_is_malformed() {
        let err = Frame::decode(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFrame);
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = Frame::decode(&[0xff, 0xff, 0xff]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFrame);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_last_variant_wins() {
        // Protobuf oneof semantics: a later field replaces an earlier one.
        let mut buf = Frame::raw(&b"x"[..]).encode().to_vec();
        buf.extend_from_slice(&Frame::complete().encode());
        assert_eq!(Frame::decode(&buf).unwrap(), Frame::complete());
    }

    #[test]
    fn test_frame_names() {
        assert_eq!(Frame::ping().name(), "ping");
        assert_eq!(Frame::pong().name(), "pong");
        assert_eq!(Frame::dispose().name(), "final");
        assert!(Frame::dispose().is_final());
        assert!(!Frame::raw(&b""[..]).is_final());
    }
}
