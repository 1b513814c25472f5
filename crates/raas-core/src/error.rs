//! Unified error handling for RaaS calls.
//!
//! Every failure a call can observe flows through [`RaasError`]. The
//! variants mirror the protocol's failure taxonomy:
//!
//! | Kind | Raised when |
//! |------|-------------|
//! | [`ErrorKind::HandshakeTimeout`] | nobody answered the call setup request |
//! | [`ErrorKind::InputTimeout`] | a port stayed silent beyond the idle bound |
//! | [`ErrorKind::PeerUnresponsive`] | a ping went unanswered |
//! | [`ErrorKind::Remote`] | the peer terminated its direction with an error frame |
//! | [`ErrorKind::MalformedFrame`] | a port received bytes that are not a frame |
//! | [`ErrorKind::Transport`] | the underlying connection failed |
//!
//! Handler-side failures on the server are raised as [`RaasError::Service`]
//! and travel to the client as the text of a terminal frame, where they
//! surface as [`RaasError::Remote`] with the same message.
//!
//! # Example
//!
//! ```rust
//! use raas_core::error::{ErrorKind, RaasError};
//!
//! let err = RaasError::service("division by zero");
//! assert_eq!(err.kind(), ErrorKind::Service);
//! // The text carried by the terminal frame is the bare message.
//! assert_eq!(err.final_message(), "division by zero");
//! ```

use std::fmt;
use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Type alias for boxed errors that are Send + Sync.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias used throughout the workspace.
pub type Result<T, E = RaasError> = std::result::Result<T, E>;

/// Classification of transport errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Connection could not be established.
    ConnectionFailed,
    /// Connection was closed.
    ConnectionClosed,
    /// Publishing a message failed.
    PublishFailed,
    /// Creating or tearing down a subscription failed.
    SubscribeFailed,
    /// Operation timed out.
    Timeout,
    /// The subject is not acceptable to the transport.
    InvalidSubject,
    /// Message exceeded the transport's size limit.
    MessageTooLarge,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed => write!(f, "connection failed"),
            Self::ConnectionClosed => write!(f, "connection closed"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::InvalidSubject => write!(f, "invalid subject"),
            Self::MessageTooLarge => write!(f, "message too large"),
        }
    }
}

/// Flat classification of [`RaasError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No reply to call setup.
    HandshakeTimeout,
    /// Idle port beyond the input bound.
    InputTimeout,
    /// Missed pong.
    PeerUnresponsive,
    /// Peer signalled failure with a terminal frame.
    Remote,
    /// Undecodable frame.
    MalformedFrame,
    /// Unusable handshake message.
    InvalidHandshake,
    /// Failure raised by a service handler.
    Service,
    /// Underlying connection failure.
    Transport,
    /// Invalid configuration.
    Config,
}

/// The error type for RaaS calls and registrations.
#[derive(Error, Diagnostic, Debug)]
pub enum RaasError {
    /// The handshake request went unanswered.
    #[error("handshake with service '{service}' timed out after {timeout:?}")]
    #[diagnostic(
        code(raas::call::handshake_timeout),
        help("Check that a node has registered the service on this subject")
    )]
    HandshakeTimeout {
        /// Service subject the handshake was sent to.
        service: String,
        /// How long the handshake waited.
        timeout: Duration,
    },

    /// No frame of any kind arrived within the idle window.
    #[error("input timed out after {timeout:?} without a frame")]
    #[diagnostic(code(raas::call::input_timeout))]
    InputTimeout {
        /// The idle window that elapsed.
        timeout: Duration,
    },

    /// A ping was not answered in time.
    #[error("peer unresponsive: no pong within {timeout:?}")]
    #[diagnostic(code(raas::call::peer_unresponsive))]
    PeerUnresponsive {
        /// How long the keepalive waited for the pong.
        timeout: Duration,
    },

    /// The peer terminated its direction with an error message.
    #[error("remote error: {message}")]
    #[diagnostic(code(raas::call::remote))]
    Remote {
        /// The message text carried by the terminal frame.
        message: String,
    },

    /// A port received bytes that do not decode as a frame.
    #[error("malformed frame: {message}")]
    #[diagnostic(
        code(raas::protocol::malformed_frame),
        help("Both peers must speak the same frame schema")
    )]
    MalformedFrame {
        /// Description of the decoding problem.
        message: String,
        /// The underlying decode error, if available.
        #[source]
        source: Option<BoxError>,
    },

    /// A handshake message could not be used to set up a call.
    #[error("invalid handshake: {message}")]
    #[diagnostic(code(raas::protocol::invalid_handshake))]
    InvalidHandshake {
        /// Description of the problem.
        message: String,
    },

    /// A service handler failed.
    #[error("{message}")]
    #[diagnostic(code(raas::service::failed))]
    Service {
        /// The handler's failure description.
        message: String,
    },

    /// The underlying connection failed.
    #[error("transport error ({kind}): {message}")]
    #[diagnostic(code(raas::transport))]
    Transport {
        /// Classification of the failure.
        kind: TransportErrorKind,
        /// Human-readable error message.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<BoxError>,
    },

    /// The configuration is unusable.
    #[error("invalid configuration: {message}")]
    #[diagnostic(code(raas::config))]
    Config {
        /// Description of the problem.
        message: String,
    },
}

impl RaasError {
    /// Create a handler failure with the given message.
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service {
            message: message.into(),
        }
    }

    /// Create a remote error from the text of a terminal frame.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Create a malformed frame error.
    pub fn malformed_frame(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
            source: None,
        }
    }

    /// Create an invalid handshake error.
    pub fn invalid_handshake(message: impl Into<String>) -> Self {
        Self::InvalidHandshake {
            message: message.into(),
        }
    }

    /// Create a transport error without an underlying source.
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Get the flat classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::HandshakeTimeout { .. } => ErrorKind::HandshakeTimeout,
            Self::InputTimeout { .. } => ErrorKind::InputTimeout,
            Self::PeerUnresponsive { .. } => ErrorKind::PeerUnresponsive,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::MalformedFrame { .. } => ErrorKind::MalformedFrame,
            Self::InvalidHandshake { .. } => ErrorKind::InvalidHandshake,
            Self::Service { .. } => ErrorKind::Service,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// Get the transport classification, if this is a transport error.
    #[must_use]
    pub const fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            Self::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Check whether this error is a timeout of any kind.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::HandshakeTimeout { .. }
                | Self::InputTimeout { .. }
                | Self::PeerUnresponsive { .. }
                | Self::Transport {
                    kind: TransportErrorKind::Timeout,
                    ..
                }
        )
    }

    /// The text to place in a terminal frame when this error ends a direction.
    ///
    /// Remote and handler errors forward their bare message so that a
    /// failure relayed through several hops keeps its original text. Every
    /// other error uses its display form. The result is never empty, since
    /// an empty terminal frame means normal completion.
    #[must_use]
    pub fn final_message(&self) -> String {
        let message = match self {
            Self::Remote { message } | Self::Service { message } => message.clone(),
            other => other.to_string(),
        };
        if message.is_empty() {
            "unknown error".to_string()
        } else {
            message
        }
    }
}
