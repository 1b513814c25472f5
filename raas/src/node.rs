//! A RaaS node: one server and one client sharing configuration.
//!
//! A node can run on a single connection, or on a dedicated connection for
//! service traffic and another for outgoing calls and raw pub/sub.

use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use raas_client::{CallStream, Client, RawSubscription};
use raas_core::error::{RaasError, Result};
use raas_server::{Registration, Server, ServerConfig, Service};
use raas_transport::Connection;
use tracing::debug;

/// A process's entry point to the bus.
///
/// `S` carries service traffic (handshakes and the service side of calls);
/// `K` carries outgoing calls and raw pub/sub. Both default to the same
/// connection type.
pub struct Node<S: Connection, K: Connection = S> {
    server: Server<S>,
    client: Client<K>,
}

impl<C: Connection> Node<C> {
    /// Create a node that uses one connection for everything.
    ///
    /// # Errors
    ///
    /// Returns [`RaasError::Config`] if the configuration is unusable.
    pub fn new(conn: Arc<C>, config: ServerConfig) -> Result<Self> {
        Self::with_connections(Arc::clone(&conn), conn, config)
    }
}

impl<S: Connection, K: Connection> Node<S, K> {
    /// Create a node with separate service and client connections.
    ///
    /// # Errors
    ///
    /// Returns [`RaasError::Config`] if the configuration is unusable.
    pub fn with_connections(service: Arc<S>, client: Arc<K>, config: ServerConfig) -> Result<Self> {
        let client = Client::new(client, config.protocol.clone())?;
        let server = Server::new(service, config)?;
        Ok(Self { server, client })
    }

    /// The node's server half.
    #[must_use]
    pub const fn server(&self) -> &Server<S> {
        &self.server
    }

    /// The node's client half.
    #[must_use]
    pub const fn client(&self) -> &Client<K> {
        &self.client
    }

    /// Register a service on the service connection.
    ///
    /// See [`Server::register`].
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or the subscription fails.
    pub async fn register<H: Service>(&self, name: impl Into<String>, service: H) -> Result<Registration> {
        self.server.register(name, service).await
    }

    /// Call a service from the client connection.
    ///
    /// See [`Client::call`].
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake fails.
    pub async fn call<I>(&self, service: &str, input: I) -> Result<CallStream>
    where
        I: Stream<Item = Result<Bytes, RaasError>> + Send + 'static,
    {
        self.client.call(service, input).await
    }

    /// Subscribe to raw messages on the client connection.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the subscription failed.
    pub async fn subscribe(&self, subject: &str) -> Result<RawSubscription<K>> {
        self.client.subscribe(subject).await
    }

    /// Publish raw bytes on the client connection.
    ///
    /// # Errors
    ///
    /// Returns the transport error if publishing failed.
    pub async fn publish(&self, subject: &str, body: impl Into<Bytes>) -> Result<()> {
        self.client.publish(subject, body).await
    }

    /// Close both connections.
    ///
    /// Every subscription of the node ends, so running calls fail and
    /// registrations stop accepting calls.
    ///
    /// # Errors
    ///
    /// Returns the first transport error encountered.
    pub async fn close(&self) -> Result<()> {
        debug!("closing node");
        let client = self.client.connection().close().await.map_err(Into::<RaasError>::into);
        let server = self.server.connection().close().await.map_err(Into::<RaasError>::into);
        client.and(server)
    }
}
