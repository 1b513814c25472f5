//! Prelude module for convenient imports.
//!
//! ```rust
//! use raas::prelude::*;
//!
//! let config = ServerConfig::new().with_protocol(ProtocolConfig::default());
//! assert_eq!(config.queue_group.as_deref(), Some("service"));
//! ```

pub use raas_core::{ErrorKind, Frame, Port, ProtocolConfig, RaasError, ServiceInfo};

pub use raas_server::{CallContext, InputStream, OutputStream, Registration, Server, ServerConfig, Service, with_context};

pub use raas_client::{CallStream, Client};

pub use raas_transport::{Connection, MemoryBus, MemoryConnection};

pub use crate::node::Node;
