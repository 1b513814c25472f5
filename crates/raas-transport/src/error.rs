//! Transport error types.

use raas_core::error::{RaasError, TransportErrorKind};
use thiserror::Error;

/// Errors that can occur during connection operations.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection error.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Connection is not open.
    #[error("Not connected")]
    NotConnected,

    /// The subject cannot be used on this connection.
    #[error("Invalid subject: {subject:?}")]
    InvalidSubject {
        /// The rejected subject.
        subject: String,
    },

    /// Message was too large.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Timeout occurred.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// How long the operation waited.
        duration: std::time::Duration,
    },
}

impl TransportError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Get the transport error kind.
    #[must_use]
    pub const fn kind(&self) -> TransportErrorKind {
        match self {
            Self::Connection { .. } | Self::NotConnected => TransportErrorKind::ConnectionFailed,
            Self::ConnectionClosed => TransportErrorKind::ConnectionClosed,
            Self::InvalidSubject { .. } => TransportErrorKind::InvalidSubject,
            Self::MessageTooLarge { .. } => TransportErrorKind::MessageTooLarge,
            Self::Timeout { .. } => TransportErrorKind::Timeout,
        }
    }
}

impl From<TransportError> for RaasError {
    fn from(err: TransportError) -> Self {
        Self::Transport {
            kind: err.kind(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}
