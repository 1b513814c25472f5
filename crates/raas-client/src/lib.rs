//! Client call sessions for RaaS.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use futures::stream;
//! use raas_client::Client;
//! use raas_core::{ErrorKind, ProtocolConfig};
//! use raas_transport::MemoryBus;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), raas_core::RaasError> {
//! let bus = MemoryBus::new();
//! let config = ProtocolConfig::new().with_handshake_timeout(Duration::from_millis(50));
//! let client = Client::new(Arc::new(bus.connect()), config)?;
//!
//! // Nobody registered "echo", so the handshake times out.
//! let err = client.call("echo", stream::empty()).await.unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::HandshakeTimeout);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

mod call;
pub mod client;

pub use call::CallStream;
pub use client::{Client, RawSubscription};
