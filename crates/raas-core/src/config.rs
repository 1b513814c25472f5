//! Protocol timing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RaasError, Result};

/// Timing parameters shared by both sides of a call.
///
/// Durations serialize as (fractional) seconds:
///
/// ```rust
/// use raas_core::config::ProtocolConfig;
/// use std::time::Duration;
///
/// let config: ProtocolConfig =
///     serde_json::from_str(r#"{ "handshake_timeout": 2, "ping_interval": 0.5 }"#).unwrap();
/// assert_eq!(config.handshake_timeout, Duration::from_secs(2));
/// assert_eq!(config.ping_interval, Duration::from_millis(500));
/// assert_eq!(config.input_timeout, ProtocolConfig::default().input_timeout);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Bound on the handshake round trip and on each ping/pong round trip.
    #[serde(with = "secs")]
    pub handshake_timeout: Duration,
    /// Idle bound on any input adapter.
    #[serde(with = "secs")]
    pub input_timeout: Duration,
    /// Keepalive cadence.
    #[serde(with = "secs")]
    pub ping_interval: Duration,
}

impl ProtocolConfig {
    /// Create a configuration with the default timings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handshake timeout.
    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the input idle timeout.
    #[must_use]
    pub const fn with_input_timeout(mut self, timeout: Duration) -> Self {
        self.input_timeout = timeout;
        self
    }

    /// Set the keepalive ping interval.
    #[must_use]
    pub const fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Check the configuration for unusable values.
    ///
    /// All durations must be non-zero. A ping interval at or above the
    /// input timeout is accepted but logged, because an otherwise quiet
    /// call would then hit the client's idle bound between pings.
    pub fn validate(&self) -> Result<()> {
        if self.handshake_timeout.is_zero() {
            return Err(RaasError::config("handshake_timeout must be non-zero"));
        }
        if self.input_timeout.is_zero() {
            return Err(RaasError::config("input_timeout must be non-zero"));
        }
        if self.ping_interval.is_zero() {
            return Err(RaasError::config("ping_interval must be non-zero"));
        }
        if self.ping_interval >= self.input_timeout {
            tracing::warn!(
                ping_interval = ?self.ping_interval,
                input_timeout = ?self.input_timeout,
                "ping interval does not fit inside the input timeout; idle calls may time out"
            );
        }
        Ok(())
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            input_timeout: Duration::from_secs(30),
            ping_interval: Duration::from_secs(5),
        }
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
