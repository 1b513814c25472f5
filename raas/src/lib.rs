//! # RaaS - streaming RPC over publish/subscribe
//!
//! RaaS ("RPC as a Service") turns any subject-based pub/sub bus into a
//! bidirectional streaming RPC system. A service is a function from an
//! input stream of byte chunks to an output stream of byte chunks; a call
//! streams input to whichever node registered the service and streams its
//! output back.
//!
//! ## Features
//!
//! - **Streaming both ways**: chunks flow in either direction while the
//!   call is open
//! - **Liveness**: the serving side pings the caller, and both sides apply
//!   an idle timeout to their input
//! - **Load sharing**: registrations of one name join a queue group
//! - **Per-registration counters** as a live [`ServiceInfo`] stream
//! - **Rich errors** with miette diagnostics
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use futures::{StreamExt, stream};
//! use raas::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), RaasError> {
//! let bus = MemoryBus::new();
//! let node = Node::new(Arc::new(bus.connect()), ServerConfig::default())?;
//!
//! let _echo = node.register("echo", |input: InputStream| input).await?;
//!
//! let input = stream::iter(["hello", "world"]).map(|s| Ok::<_, RaasError>(raas::Bytes::from(s)));
//! let output: Vec<_> = node.call("echo", input).await?.collect().await;
//! assert_eq!(output.len(), 2);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

// Re-export all public items from core
pub use raas_core::*;

pub use raas_client::{CallStream, Client, RawSubscription};
pub use raas_server::{
    CallContext, InputStream, OutputStream, Registration, Server, ServerConfig, Service,
    with_context,
};
pub use raas_transport::{Connection, ConnectionMetadata, MemoryBus, MemoryConnection};

pub mod node;
pub mod prelude;
pub mod telemetry;

pub use node::Node;

/// Server module re-exports
pub mod server {
    //! Service registration and server call sessions.
    pub use raas_server::*;
}

/// Transport module re-exports
pub mod transport {
    //! Connections and call stream machinery.
    pub use raas_transport::*;
}

/// Client module re-exports
pub mod client {
    //! Client call sessions.
    pub use raas_client::*;
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;
        let _ = std::any::type_name::<RaasError>();
        let _ = std::any::type_name::<Node<MemoryConnection>>();
    }
}
