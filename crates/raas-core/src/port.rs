//! Ephemeral call ports.
//!
//! A [`Port`] is a transport subject that exists for exactly one direction
//! of one call. Ports are random 128-bit identifiers, so a peer cannot
//! guess the subject another call is using.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RaasError, Result};

/// A single-use subject scoped to one (call, direction) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(String);

impl Port {
    /// Allocate a fresh port.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Parse a port from a handshake message body.
    ///
    /// The body must be non-empty UTF-8 without whitespace, since the port
    /// is used verbatim as a subject.
    pub fn from_bytes(body: &[u8]) -> Result<Self> {
        let subject = std::str::from_utf8(body)
            .map_err(|e| RaasError::invalid_handshake(format!("port is not UTF-8: {e}")))?;
        if subject.is_empty() {
            return Err(RaasError::invalid_handshake("port is empty"));
        }
        if subject.chars().any(char::is_whitespace) {
            return Err(RaasError::invalid_handshake(format!(
                "port contains whitespace: {subject:?}"
            )));
        }
        Ok(Self(subject.to_string()))
    }

    /// The port as a subject string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The port as a handshake message body.
    #[must_use]
    pub fn to_bytes(&self) -> bytes::Bytes {
        bytes::Bytes::copy_from_slice(self.0.as_bytes())
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Port {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
