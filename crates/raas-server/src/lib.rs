//! Service registration and server call sessions for RaaS.
//!
//! A node exposes a service by registering a handler under a name. The
//! handler sees each call as an input stream of chunks and answers with an
//! output stream; the session machinery takes care of ports, frames,
//! keepalive and counters.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use raas_server::{InputStream, Server, ServerConfig};
//! use raas_transport::MemoryBus;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), raas_core::RaasError> {
//! let bus = MemoryBus::new();
//! let server = Server::new(Arc::new(bus.connect()), ServerConfig::default())?;
//!
//! // Echo every chunk back to the caller.
//! let registration = server.register("echo", |input: InputStream| input).await?;
//! assert_eq!(registration.info().called_num, 0);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

mod info;
pub mod server;
pub mod service;
mod session;

pub use info::SNAPSHOT_BUFFER;
pub use raas_transport::InputStream;
pub use server::{DEFAULT_QUEUE_GROUP, Registration, Server, ServerConfig};
pub use service::{CallContext, OutputStream, Service, WithContext, with_context};
