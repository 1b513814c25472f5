//! Fault injection for connections.
//!
//! [`FaultyConnection`] wraps any [`Connection`] and silently drops or
//! delays selected publishes, which is how tests simulate a peer that
//! stopped answering pings, a slow peer, or a lossy link. Faults can be switched on and off
//! while calls are running through the shared [`Faults`] handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use raas_core::frame::Frame;
use raas_transport::middleware::ConnectionLayer;
use raas_transport::{Connection, ConnectionMetadata, Msg};
use tracing::trace;

/// Switches controlling which publishes are dropped.
#[derive(Debug, Default)]
pub struct Faults {
    drop_pongs: AtomicBool,
    drop_all: AtomicBool,
    pong_delay_ms: AtomicU64,
    dropped: AtomicU64,
}

impl Faults {
    /// Create a handle with every fault disabled.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Drop (or stop dropping) outgoing pong frames.
    pub fn set_drop_pongs(&self, enabled: bool) {
        self.drop_pongs.store(enabled, Ordering::SeqCst);
    }

    /// Drop (or stop dropping) every outgoing publish.
    pub fn set_drop_all(&self, enabled: bool) {
        self.drop_all.store(enabled, Ordering::SeqCst);
    }

    /// Deliver outgoing pong frames `delay` after they were published.
    ///
    /// The publish itself returns immediately. `Duration::ZERO` turns the
    /// delay off.
    pub fn set_pong_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.pong_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of publishes dropped so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    fn should_drop(&self, body: &[u8]) -> bool {
        if self.drop_all.load(Ordering::SeqCst) {
            return true;
        }
        self.drop_pongs.load(Ordering::SeqCst) && is_pong(body)
    }

    fn delay_for(&self, body: &[u8]) -> Option<Duration> {
        let millis = self.pong_delay_ms.load(Ordering::SeqCst);
        (millis > 0 && is_pong(body)).then(|| Duration::from_millis(millis))
    }
}

fn is_pong(body: &[u8]) -> bool {
    matches!(Frame::decode(body), Ok(Frame::PingPong(false)))
}

/// Layer producing a [`FaultyConnection`].
#[derive(Debug, Clone)]
pub struct FaultLayer {
    faults: Arc<Faults>,
}

impl FaultLayer {
    /// Create a layer controlled by `faults`.
    #[must_use]
    pub const fn new(faults: Arc<Faults>) -> Self {
        Self { faults }
    }
}

impl<C: Connection> ConnectionLayer<C> for FaultLayer {
    type Connection = FaultyConnection<C>;

    fn layer(&self, inner: C) -> Self::Connection {
        FaultyConnection {
            inner: Arc::new(inner),
            faults: Arc::clone(&self.faults),
        }
    }
}

/// A connection that drops publishes according to its [`Faults`].
pub struct FaultyConnection<C> {
    inner: Arc<C>,
    faults: Arc<Faults>,
}

impl<C> FaultyConnection<C> {
    /// The fault switches for this connection.
    #[must_use]
    pub fn faults(&self) -> &Arc<Faults> {
        &self.faults
    }
}

impl<C: Connection> Connection for FaultyConnection<C> {
    type Error = C::Error;
    type Subscription = C::Subscription;

    async fn publish(&self, subject: &str, body: Bytes) -> Result<(), Self::Error> {
        if self.faults.should_drop(&body) {
            let dropped = self.faults.dropped.fetch_add(1, Ordering::SeqCst) + 1;
            trace!(subject, dropped, "dropping publish");
            return Ok(());
        }
        if let Some(delay) = self.faults.delay_for(&body) {
            let inner = Arc::clone(&self.inner);
            let subject = subject.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if inner.publish(&subject, body).await.is_err() {
                    trace!(subject = %subject, "delayed publish failed");
                }
            });
            return Ok(());
        }
        self.inner.publish(subject, body).await
    }

    async fn subscribe(&self, subject: &str) -> Result<Self::Subscription, Self::Error> {
        self.inner.subscribe(subject).await
    }

    async fn subscribe_queue(
        &self,
        subject: &str,
        group: &str,
    ) -> Result<Self::Subscription, Self::Error> {
        self.inner.subscribe_queue(subject, group).await
    }

    async fn request(
        &self,
        subject: &str,
        body: Bytes,
        timeout: Duration,
    ) -> Result<Msg, Self::Error> {
        self.inner.request(subject, body, timeout).await
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.inner.close().await
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn metadata(&self) -> ConnectionMetadata {
        self.inner.metadata()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use raas_transport::MemoryBus;

    #[tokio::test]
    async fn test_drops_only_pongs() {
        let bus = MemoryBus::new();
        let faults = Faults::new();
        let conn = FaultLayer::new(Arc::clone(&faults)).layer(bus.connect());
        let mut sub = conn.subscribe("port").await.unwrap();

        faults.set_drop_pongs(true);
        conn.publish("port", Frame::pong().encode()).await.unwrap();
        conn.publish("port", Frame::ping().encode()).await.unwrap();

        let msg = sub.next().await.unwrap();
        assert_eq!(Frame::decode(&msg.body).unwrap(), Frame::ping());
        assert_eq!(faults.dropped(), 1);
    }

    #[tokio::test]
    async fn test_faults_can_be_cleared() {
        let bus = MemoryBus::new();
        let faults = Faults::new();
        let conn = FaultLayer::new(Arc::clone(&faults)).layer(bus.connect());
        let mut sub = conn.subscribe("port").await.unwrap();

        faults.set_drop_all(true);
        conn.publish("port", Bytes::from_static(b"lost")).await.unwrap();
        faults.set_drop_all(false);
        conn.publish("port", Bytes::from_static(b"kept")).await.unwrap();

        assert_eq!(sub.next().await.unwrap().body, Bytes::from_static(b"kept"));
    }

    #[tokio::test]
    async fn test_delays_pongs() {
        let bus = MemoryBus::new();
        let faults = Faults::new();
        let conn = FaultLayer::new(Arc::clone(&faults)).layer(bus.connect());
        let mut sub = conn.subscribe("port").await.unwrap();

        faults.set_pong_delay(Duration::from_millis(50));
        conn.publish("port", Frame::pong().encode()).await.unwrap();
        conn.publish("port", Frame::ping().encode()).await.unwrap();

        let first = sub.next().await.unwrap();
        assert_eq!(Frame::decode(&first.body).unwrap(), Frame::ping());
        let started = tokio::time::Instant::now();
        let second = sub.next().await.unwrap();
        assert_eq!(Frame::decode(&second.body).unwrap(), Frame::pong());
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(faults.dropped(), 0);
    }
}
