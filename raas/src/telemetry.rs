//! Tracing initialisation for binaries.
//!
//! Libraries never install a subscriber; binaries call one of these once
//! at startup. The filter comes from `RUST_LOG`, falling back to the given
//! default directive.

use raas_core::error::{RaasError, Result};
use tracing_subscriber::EnvFilter;

fn filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install a human-readable subscriber.
///
/// # Errors
///
/// Returns [`RaasError::Config`] if a global subscriber is already set.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_directive))
        .with_target(true)
        .try_init()
        .map_err(|e| RaasError::config(format!("failed to install tracing subscriber: {e}")))
}

/// Install a subscriber emitting one JSON object per event.
///
/// # Errors
///
/// Returns [`RaasError::Config`] if a global subscriber is already set.
pub fn init_json_tracing(default_directive: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter(default_directive))
        .with_current_span(true)
        .try_init()
        .map_err(|e| RaasError::config(format!("failed to install tracing subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        // Only the first installation in a process can succeed.
        let _ = init_tracing("warn");
        let err = init_json_tracing("warn").unwrap_err();
        assert_eq!(err.kind(), raas_core::ErrorKind::Config);
    }
}
