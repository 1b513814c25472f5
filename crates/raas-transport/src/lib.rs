//! Connection abstraction and call stream machinery for RaaS.
//!
//! This crate sits between the protocol types in `raas-core` and the
//! server/client session logic. It provides:
//!
//! | Item | Role |
//! |------|------|
//! | [`Connection`] | The pub/sub operations a node needs from its bus |
//! | [`MemoryBus`] | In-process bus for tests and single-process deployments |
//! | [`InputAdapter`] / [`InputStream`] | Port subscription to chunk stream |
//! | [`OutputPublisher`] | Chunk stream to frames on a port, one terminal frame |
//! | [`Keepalive`] | Fixed-cadence ping/pong probing of a peer |
//! | [`middleware`] | Connection layers such as [`middleware::LoggingLayer`] |
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use futures::StreamExt;
//! use raas_core::{Frame, Port};
//! use raas_transport::{Connection, ConnectionExt, InputAdapter, MemoryBus};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = MemoryBus::new();
//! let conn = Arc::new(bus.connect());
//! let (port, peer) = (Port::generate(), Port::generate());
//!
//! let sub = conn.subscribe(port.as_str()).await?;
//! let mut input = InputAdapter::new(Arc::clone(&conn), port.clone(), peer, sub, Duration::from_secs(1))
//!     .spawn(CancellationToken::new());
//!
//! conn.publish_frame(&port, &Frame::raw(&b"hello"[..])).await?;
//! conn.publish_frame(&port, &Frame::complete()).await?;
//!
//! assert_eq!(&input.next().await.unwrap()?[..], b"hello");
//! assert!(input.next().await.is_none());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod error;
pub mod inbound;
pub mod keepalive;
pub mod memory;
pub mod middleware;
pub mod outbound;
pub mod traits;

pub use error::TransportError;
pub use inbound::{InputAdapter, InputStream, PongSignal};
pub use keepalive::Keepalive;
pub use memory::{MemoryBus, MemoryConnection, MemorySubscription};
pub use outbound::{OutputOutcome, OutputPublisher};
pub use traits::{Connection, ConnectionExt, ConnectionMetadata, Msg};
