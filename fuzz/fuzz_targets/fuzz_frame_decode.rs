//! Fuzz target for frame decoding.
//!
//! Arbitrary bytes arriving on a port must decode to a frame or fail with
//! an error, never panic. Whatever decodes must survive re-encoding.

#![no_main]

use libfuzzer_sys::fuzz_target;
use raas_core::frame::Frame;

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = Frame::decode(data) {
        let again = Frame::decode(&frame.encode()).expect("re-encoded frame decodes");
        assert_eq!(again, frame);
    }
});
