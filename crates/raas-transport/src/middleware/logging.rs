//! Logging middleware for connections.
//!
//! Logs every publish, subscription and delivered message, and keeps
//! running counters that tests and diagnostics can read.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use tracing::{Level, debug, trace};

use crate::middleware::ConnectionLayer;
use crate::traits::{Connection, ConnectionMetadata, Msg};

/// A layer that adds logging to a connection.
#[derive(Debug, Clone)]
pub struct LoggingLayer {
    level: Level,
}

impl LoggingLayer {
    /// Create a logging layer that logs at the given level.
    ///
    /// Only `TRACE` and `DEBUG` are distinguished; anything else logs at
    /// `DEBUG`.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }
}

impl Default for LoggingLayer {
    fn default() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl<C: Connection> ConnectionLayer<C> for LoggingLayer {
    type Connection = LoggingConnection<C>;

    fn layer(&self, inner: C) -> Self::Connection {
        LoggingConnection {
            inner,
            level: self.level,
            published: AtomicU64::new(0),
            subscriptions: AtomicU64::new(0),
            received: Arc::new(AtomicU64::new(0)),
        }
    }
}

macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {
        if $level == Level::TRACE {
            trace!($($arg)+)
        } else {
            debug!($($arg)+)
        }
    };
}

/// A connection wrapped with logging.
pub struct LoggingConnection<C> {
    inner: C,
    level: Level,
    published: AtomicU64,
    subscriptions: AtomicU64,
    received: Arc<AtomicU64>,
}

impl<C> LoggingConnection<C> {
    /// Number of messages published through this connection.
    pub fn messages_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Number of messages delivered to this connection's subscriptions.
    pub fn messages_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Number of subscriptions opened through this connection.
    pub fn subscriptions_opened(&self) -> u64 {
        self.subscriptions.load(Ordering::Relaxed)
    }

    /// Get a reference to the wrapped connection.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn wrap(&self, subject: &str, inner: C::Subscription) -> LoggedSubscription<C::Subscription>
    where
        C: Connection,
    {
        let count = self.subscriptions.fetch_add(1, Ordering::Relaxed) + 1;
        log_at!(self.level, count, subject, "subscribed");
        LoggedSubscription {
            inner,
            level: self.level,
            received: Arc::clone(&self.received),
        }
    }
}

impl<C: Connection> Connection for LoggingConnection<C> {
    type Error = C::Error;
    type Subscription = LoggedSubscription<C::Subscription>;

    async fn publish(&self, subject: &str, body: Bytes) -> Result<(), Self::Error> {
        let count = self.published.fetch_add(1, Ordering::Relaxed) + 1;
        log_at!(self.level, count, subject, size = body.len(), "publishing message");
        self.inner.publish(subject, body).await
    }

    async fn subscribe(&self, subject: &str) -> Result<Self::Subscription, Self::Error> {
        let inner = self.inner.subscribe(subject).await?;
        Ok(self.wrap(subject, inner))
    }

    async fn subscribe_queue(
        &self,
        subject: &str,
        group: &str,
    ) -> Result<Self::Subscription, Self::Error> {
        let inner = self.inner.subscribe_queue(subject, group).await?;
        Ok(self.wrap(subject, inner))
    }

    async fn request(
        &self,
        subject: &str,
        body: Bytes,
        timeout: Duration,
    ) -> Result<Msg, Self::Error> {
        log_at!(self.level, subject, ?timeout, "sending request");
        let result = self.inner.request(subject, body, timeout).await;
        match &result {
            Ok(reply) => log_at!(self.level, subject, size = reply.body.len(), "received reply"),
            Err(e) => debug!(subject, error = %e, "request failed"),
        }
        result
    }

    async fn close(&self) -> Result<(), Self::Error> {
        debug!(
            published = self.messages_published(),
            received = self.messages_received(),
            subscriptions = self.subscriptions_opened(),
            "closing connection"
        );
        self.inner.close().await
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn metadata(&self) -> ConnectionMetadata {
        self.inner.metadata()
    }
}

pin_project! {
    /// A subscription that counts and logs delivered messages.
    pub struct LoggedSubscription<S> {
        #[pin]
        inner: S,
        level: Level,
        received: Arc<AtomicU64>,
    }
}

impl<S: Stream<Item = Msg>> Stream for LoggedSubscription<S> {
    type Item = Msg;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let polled = this.inner.poll_next(cx);
        if let Poll::Ready(Some(msg)) = &polled {
            let count = this.received.fetch_add(1, Ordering::Relaxed) + 1;
            log_at!(*this.level, count, subject = %msg.subject, size = msg.body.len(), "received message");
        }
        polled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBus;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_counters() {
        let bus = MemoryBus::new();
        let conn = LoggingLayer::new(Level::TRACE).layer(bus.connect());

        let mut sub = conn.subscribe("subject").await.unwrap();
        conn.publish("subject", Bytes::from_static(b"a")).await.unwrap();
        conn.publish("subject", Bytes::from_static(b"b")).await.unwrap();
        sub.next().await.unwrap();
        sub.next().await.unwrap();

        assert_eq!(conn.messages_published(), 2);
        assert_eq!(conn.messages_received(), 2);
        assert_eq!(conn.subscriptions_opened(), 1);
    }

    #[tokio::test]
    async fn test_close_passes_through() {
        let bus = MemoryBus::new();
        let conn = LoggingLayer::default().layer(bus.connect());

        conn.close().await.unwrap();
        assert!(!conn.is_connected());
    }
}
