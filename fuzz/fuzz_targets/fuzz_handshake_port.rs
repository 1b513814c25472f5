//! Fuzz target for handshake port parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use raas_core::port::Port;

fuzz_target!(|data: &[u8]| {
    if let Ok(port) = Port::from_bytes(data) {
        assert!(!port.as_str().is_empty());
        assert!(!port.as_str().chars().any(char::is_whitespace));
        assert_eq!(&port.to_bytes()[..], data);
    }
});
