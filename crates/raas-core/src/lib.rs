//! Core types for the RaaS streaming RPC protocol.
//!
//! RaaS turns a plain publish/subscribe connection into bidirectional
//! streaming calls. This crate holds the pieces that need no async
//! runtime:
//!
//! - [`frame::Frame`]: the tagged union exchanged on a call's ports, and
//!   its protobuf codec
//! - [`port::Port`]: random, single-use subjects allocated per call
//!   direction
//! - [`config::ProtocolConfig`]: handshake, input and keepalive timings
//! - [`info::ServiceInfo`]: per-registration call counters
//! - [`error::RaasError`]: the unified error type
//!
//! # Call flow
//!
//! ```text
//! client                                   server
//!   | -- request(service, client_port) -----> |
//!   | <------------------ reply(service_port) |
//!   | -- Raw* Final ----------> service_port  |
//!   |  client_port <------- Raw* Ping* Final  |
//!   | -- Pong ----------------> service_port  |
//! ```

pub mod config;
pub mod error;
pub mod frame;
pub mod info;
pub mod port;

pub use config::ProtocolConfig;
pub use error::{BoxError, ErrorKind, RaasError, Result, TransportErrorKind};
pub use frame::{DISPOSE_MESSAGE, Frame};
pub use info::ServiceInfo;
pub use port::Port;

// Re-export bytes so handler code does not need a direct dependency.
pub use bytes::Bytes;
