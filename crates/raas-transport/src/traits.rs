//! Connection traits for the RaaS protocol.
//!
//! A RaaS node needs four things from its message bus: fire-and-forget
//! publish, plain subscriptions, queue-group subscriptions (one member of
//! the group receives each message), and request/reply with a timeout.
//! [`Connection`] captures exactly that.
//!
//! # Example
//!
//! ```rust
//! use raas_transport::{Connection, MemoryBus};
//! use futures::StreamExt;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = MemoryBus::new();
//! let conn = bus.connect();
//!
//! let mut sub = conn.subscribe("greetings").await?;
//! conn.publish("greetings", "hello".into()).await?;
//!
//! let msg = sub.next().await.expect("message");
//! assert_eq!(&msg.body[..], b"hello");
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::Stream;
use raas_core::error::RaasError;
use raas_core::frame::Frame;
use raas_core::port::Port;

/// A message delivered by a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Msg {
    /// Subject the message was published to.
    pub subject: String,
    /// Message payload.
    pub body: Bytes,
    /// Subject a reply should be published to, if the sender expects one.
    pub reply_to: Option<String>,
}

impl Msg {
    /// Create a message without a reply subject.
    pub fn new(subject: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            reply_to: None,
        }
    }

    /// Set the reply subject.
    #[must_use]
    pub fn with_reply(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }
}

/// Metadata about a connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionMetadata {
    /// Connection type identifier (e.g., "memory", "nats").
    pub transport_type: String,
    /// Human-readable connection name, if any.
    pub name: Option<String>,
    /// When the connection was established.
    pub connected_at: Option<Instant>,
}

impl ConnectionMetadata {
    /// Create new metadata for a connection type.
    #[must_use]
    pub fn new(transport_type: impl Into<String>) -> Self {
        Self {
            transport_type: transport_type.into(),
            name: None,
            connected_at: None,
        }
    }

    /// Set the connection name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark the connection time.
    #[must_use]
    pub fn connected_now(mut self) -> Self {
        self.connected_at = Some(Instant::now());
        self
    }
}

/// A connection to a subject-based pub/sub bus.
///
/// Implementations must be `Send + Sync`; one connection is shared by every
/// call a node runs. Subscriptions end (yield `None`) when the connection
/// closes, and unsubscribe when dropped.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Into<RaasError> + Send + Sync + 'static;

    /// The stream of messages produced by a subscription.
    type Subscription: Stream<Item = Msg> + Send + Unpin + 'static;

    /// Publish a message to a subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or the subject is
    /// unusable. Having no subscribers is not an error.
    fn publish(
        &self,
        subject: &str,
        body: Bytes,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Subscribe to every message published to a subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription could not be created.
    fn subscribe(
        &self,
        subject: &str,
    ) -> impl Future<Output = Result<Self::Subscription, Self::Error>> + Send;

    /// Subscribe as a member of a queue group.
    ///
    /// Each message published to the subject is delivered to exactly one
    /// member of each group.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription could not be created.
    fn subscribe_queue(
        &self,
        subject: &str,
        group: &str,
    ) -> impl Future<Output = Result<Self::Subscription, Self::Error>> + Send;

    /// Publish a request and wait for the first reply.
    ///
    /// # Errors
    ///
    /// Returns a timeout error if no reply arrives within `timeout`.
    fn request(
        &self,
        subject: &str,
        body: Bytes,
        timeout: Duration,
    ) -> impl Future<Output = Result<Msg, Self::Error>> + Send;

    /// Close the connection, ending all of its subscriptions.
    ///
    /// # Errors
    ///
    /// Returns an error if the close operation failed.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Check if the connection is still open.
    fn is_connected(&self) -> bool;

    /// Get metadata about the connection.
    fn metadata(&self) -> ConnectionMetadata;
}

/// Protocol helpers available on every [`Connection`].
pub trait ConnectionExt: Connection {
    /// Encode a frame and publish it to a port.
    fn publish_frame(
        &self,
        port: &Port,
        frame: &Frame,
    ) -> impl Future<Output = Result<(), RaasError>> + Send {
        let body = frame.encode();
        async move { self.publish(port.as_str(), body).await.map_err(Into::into) }
    }
}

impl<C: Connection> ConnectionExt for C {}
