//! Structure-aware fuzz target for frames.
//!
//! Builds frames from arbitrary variants, optionally corrupts the encoded
//! bytes, and checks the codec round trip and the error path.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use raas_core::frame::Frame;

#[derive(Debug, Arbitrary)]
enum FuzzFrame {
    Raw(Vec<u8>),
    Final(String),
    PingPong(bool),
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    frame: FuzzFrame,
    /// Byte offset and value to overwrite after encoding.
    corruption: Option<(usize, u8)>,
    /// Bytes appended after encoding.
    trailer: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let frame = match input.frame {
        FuzzFrame::Raw(chunk) => Frame::raw(chunk),
        FuzzFrame::Final(message) => Frame::Final(message),
        FuzzFrame::PingPong(is_ping) => Frame::PingPong(is_ping),
    };

    let mut bytes = frame.encode().to_vec();
    if input.corruption.is_none() && input.trailer.is_empty() {
        assert_eq!(Frame::decode(&bytes).expect("encoded frame decodes"), frame);
        return;
    }

    if let Some((offset, value)) = input.corruption {
        if !bytes.is_empty() {
            let at = offset % bytes.len();
            bytes[at] = value;
        }
    }
    bytes.extend_from_slice(&input.trailer);
    let _ = Frame::decode(&bytes);
});
