//! Custom assertions for call results.

use raas_core::error::{ErrorKind, RaasError};

/// Assert that an error has the expected kind.
///
/// # Panics
///
/// Panics if the kinds differ.
pub fn assert_error_kind(err: &RaasError, expected: ErrorKind) {
    assert_eq!(
        err.kind(),
        expected,
        "Expected {expected:?} error, but got: {err}"
    );
}

/// Assert that an error is a remote error carrying `expected_message`.
///
/// # Panics
///
/// Panics if the error is not [`RaasError::Remote`] or its message differs.
pub fn assert_remote_error(err: &RaasError, expected_message: &str) {
    match err {
        RaasError::Remote { message } => assert_eq!(
            message, expected_message,
            "Remote error carried an unexpected message"
        ),
        other => panic!("Expected remote error '{expected_message}', but got: {other}"),
    }
}
