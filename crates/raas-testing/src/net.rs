//! An in-memory network of nodes for end-to-end tests.
//!
//! ```rust
//! use raas_testing::{TestNet, fixtures};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let net = TestNet::new();
//! let _registration = net.server().register("echo", fixtures::echo()).await.unwrap();
//!
//! let call = net.client().call("echo", fixtures::call_input(["hi"])).await.unwrap();
//! assert_eq!(fixtures::collect(call).await.unwrap(), fixtures::chunks(["hi"]));
//! # }
//! ```

use std::sync::Arc;

use raas_client::Client;
use raas_core::config::ProtocolConfig;
use raas_server::{Server, ServerConfig};
use raas_transport::middleware::ConnectionLayer;
use raas_transport::{MemoryBus, MemoryConnection};

use crate::faulty::{FaultLayer, Faults, FaultyConnection};

/// A shared bus with helpers to put servers and clients on it.
///
/// Every server and client gets its own connection, like separate
/// processes sharing one broker.
#[derive(Debug, Clone, Default)]
pub struct TestNet {
    bus: MemoryBus,
    config: ProtocolConfig,
}

impl TestNet {
    /// Create a network using the default timings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a network whose servers and clients use `config`.
    #[must_use]
    pub fn with_config(config: ProtocolConfig) -> Self {
        Self {
            bus: MemoryBus::new(),
            config,
        }
    }

    /// The underlying bus.
    #[must_use]
    pub const fn bus(&self) -> &MemoryBus {
        &self.bus
    }

    /// The timings used by [`server`](Self::server) and
    /// [`client`](Self::client).
    #[must_use]
    pub const fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Open a fresh connection.
    #[must_use]
    pub fn connection(&self) -> Arc<MemoryConnection> {
        Arc::new(self.bus.connect())
    }

    /// A server with the network's timings.
    ///
    /// # Panics
    ///
    /// Panics if the network's configuration is invalid.
    #[must_use]
    pub fn server(&self) -> Server<MemoryConnection> {
        self.server_with(self.config.clone())
    }

    /// A server with its own timings.
    ///
    /// # Panics
    ///
    /// Panics if `config` is invalid.
    #[must_use]
    pub fn server_with(&self, config: ProtocolConfig) -> Server<MemoryConnection> {
        Server::new(self.connection(), ServerConfig::new().with_protocol(config))
            .expect("valid server configuration")
    }

    /// A client with the network's timings.
    ///
    /// # Panics
    ///
    /// Panics if the network's configuration is invalid.
    #[must_use]
    pub fn client(&self) -> Client<MemoryConnection> {
        self.client_with(self.config.clone())
    }

    /// A client with its own timings.
    ///
    /// # Panics
    ///
    /// Panics if `config` is invalid.
    #[must_use]
    pub fn client_with(&self, config: ProtocolConfig) -> Client<MemoryConnection> {
        Client::new(self.connection(), config).expect("valid client configuration")
    }

    /// A client whose outgoing publishes can be dropped on demand.
    ///
    /// # Panics
    ///
    /// Panics if the network's configuration is invalid.
    #[must_use]
    pub fn faulty_client(&self) -> (Client<FaultyConnection<MemoryConnection>>, Arc<Faults>) {
        let faults = Faults::new();
        let conn = FaultLayer::new(Arc::clone(&faults)).layer(self.bus.connect());
        let client = Client::new(Arc::new(conn), self.config.clone())
            .expect("valid client configuration");
        (client, faults)
    }
}
