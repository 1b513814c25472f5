//! In-memory message bus for testing.
//!
//! [`MemoryBus`] is an in-process stand-in for a subject-based broker. Each
//! [`MemoryBus::connect`] call yields an independent [`MemoryConnection`];
//! every connection on the same bus sees every other connection's
//! publishes, the way separate clients of one broker do.
//!
//! Delivery is synchronous with `publish`: by the time `publish` returns
//! the message sits in each matching subscriber's queue. Queue groups are
//! served round-robin.
//!
//! # Example
//!
//! ```rust
//! use raas_transport::{Connection, MemoryBus};
//!
//! let bus = MemoryBus::new();
//! let a = bus.connect();
//! let b = bus.connect();
//!
//! assert!(a.is_connected());
//! assert!(b.is_connected());
//! assert_eq!(bus.subscription_count(), 0);
//! ```

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use raas_core::port::Port;
use tracing::trace;

use crate::error::TransportError;
use crate::traits::{Connection, ConnectionMetadata, Msg};

/// Prefix of the private reply subjects used by [`Connection::request`].
pub const INBOX_PREFIX: &str = "_INBOX.";

struct Route {
    id: u64,
    owner: u64,
    group: Option<String>,
    sender: mpsc::UnboundedSender<Msg>,
}

#[derive(Default)]
struct BusInner {
    routes: Mutex<HashMap<String, Vec<Route>>>,
    next_id: AtomicU64,
    cursor: AtomicU64,
}

impl BusInner {
    fn routes(&self) -> MutexGuard<'_, HashMap<String, Vec<Route>>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.routes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn add(&self, subject: &str, owner: u64, group: Option<String>) -> (u64, mpsc::UnboundedReceiver<Msg>) {
        let (sender, receiver) = mpsc::unbounded();
        let id = self.next_id();
        self.routes()
            .entry(subject.to_string())
            .or_default()
            .push(Route {
                id,
                owner,
                group,
                sender,
            });
        (id, receiver)
    }

    fn remove(&self, subject: &str, id: u64) {
        let mut routes = self.routes();
        if let Some(list) = routes.get_mut(subject) {
            list.retain(|route| route.id != id);
            if list.is_empty() {
                routes.remove(subject);
            }
        }
    }

    fn remove_owner(&self, owner: u64) -> usize {
        let mut routes = self.routes();
        let mut removed = 0;
        routes.retain(|_, list| {
            let before = list.len();
            list.retain(|route| route.owner != owner);
            removed += before - list.len();
            !list.is_empty()
        });
        removed
    }

    fn deliver(&self, msg: &Msg) -> usize {
        let routes = self.routes();
        let Some(list) = routes.get(&msg.subject) else {
            return 0;
        };

        let mut delivered = 0;
        let mut groups: Vec<&str> = Vec::new();
        for route in list {
            match &route.group {
                None => {
                    if route.sender.unbounded_send(msg.clone()).is_ok() {
                        delivered += 1;
                    }
                }
                Some(group) if !groups.contains(&group.as_str()) => groups.push(group),
                Some(_) => {}
            }
        }

        for group in groups {
            let members: Vec<&Route> = list
                .iter()
                .filter(|route| route.group.as_deref() == Some(group))
                .collect();
            let turn = self.cursor.fetch_add(1, Ordering::Relaxed);
            let chosen = members[(turn % members.len() as u64) as usize];
            if chosen.sender.unbounded_send(msg.clone()).is_ok() {
                delivered += 1;
            }
        }

        delivered
    }
}

/// An in-process pub/sub bus.
///
/// Cloning a bus yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<BusInner>,
}

impl MemoryBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new connection to the bus.
    #[must_use]
    pub fn connect(&self) -> MemoryConnection {
        let id = self.inner.next_id();
        MemoryConnection {
            bus: Arc::clone(&self.inner),
            id,
            connected: AtomicBool::new(true),
            metadata: ConnectionMetadata::new("memory")
                .name(format!("memory-{id}"))
                .connected_now(),
        }
    }

    /// Total number of live subscriptions across all connections.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.routes().values().map(Vec::len).sum()
    }

    /// Check whether anything is subscribed to a subject.
    #[must_use]
    pub fn has_subscribers(&self, subject: &str) -> bool {
        self.inner.routes().contains_key(subject)
    }
}

impl std::fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBus")
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

/// A connection to a [`MemoryBus`].
pub struct MemoryConnection {
    bus: Arc<BusInner>,
    id: u64,
    connected: AtomicBool,
    metadata: ConnectionMetadata,
}

impl MemoryConnection {
    fn check_open(&self) -> Result<(), TransportError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }

    fn subscription(&self, subject: &str, group: Option<&str>) -> Result<MemorySubscription, TransportError> {
        self.check_open()?;
        check_subject(subject)?;
        if let Some(group) = group {
            check_subject(group)?;
        }

        let (id, receiver) = self.bus.add(subject, self.id, group.map(str::to_string));
        trace!(subject, group, id, "subscribed");
        Ok(MemorySubscription {
            bus: Arc::clone(&self.bus),
            subject: subject.to_string(),
            id,
            receiver,
            active: true,
        })
    }

    fn deliver(&self, msg: &Msg) -> Result<(), TransportError> {
        self.check_open()?;
        check_subject(&msg.subject)?;
        let delivered = self.bus.deliver(msg);
        trace!(subject = %msg.subject, delivered, "published");
        Ok(())
    }
}

impl Connection for MemoryConnection {
    type Error = TransportError;
    type Subscription = MemorySubscription;

    async fn publish(&self, subject: &str, body: Bytes) -> Result<(), Self::Error> {
        self.deliver(&Msg::new(subject, body))
    }

    async fn subscribe(&self, subject: &str) -> Result<Self::Subscription, Self::Error> {
        self.subscription(subject, None)
    }

    async fn subscribe_queue(
        &self,
        subject: &str,
        group: &str,
    ) -> Result<Self::Subscription, Self::Error> {
        self.subscription(subject, Some(group))
    }

    async fn request(
        &self,
        subject: &str,
        body: Bytes,
        timeout: Duration,
    ) -> Result<Msg, Self::Error> {
        let inbox = format!("{INBOX_PREFIX}{}", Port::generate());
        let mut replies = self.subscription(&inbox, None)?;
        self.deliver(&Msg::new(subject, body).with_reply(inbox))?;

        match tokio::time::timeout(timeout, replies.next()).await {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => Err(TransportError::ConnectionClosed),
            Err(_) => Err(TransportError::Timeout {
                operation: format!("request to '{subject}'"),
                duration: timeout,
            }),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        if self.connected.swap(false, Ordering::SeqCst) {
            let removed = self.bus.remove_owner(self.id);
            trace!(connection = self.id, removed, "connection closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn metadata(&self) -> ConnectionMetadata {
        self.metadata.clone()
    }
}

impl std::fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// A subscription on a [`MemoryBus`].
///
/// Dropping the subscription unsubscribes it.
pub struct MemorySubscription {
    bus: Arc<BusInner>,
    subject: String,
    id: u64,
    receiver: mpsc::UnboundedReceiver<Msg>,
    active: bool,
}

impl MemorySubscription {
    /// The subject this subscription listens on.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Stop receiving messages.
    ///
    /// Messages already queued are still yielded. Calling this more than
    /// once is a no-op.
    pub fn unsubscribe(&mut self) {
        if self.active {
            self.active = false;
            self.bus.remove(&self.subject, self.id);
            self.receiver.close();
            trace!(subject = %self.subject, id = self.id, "unsubscribed");
        }
    }
}

impl Stream for MemorySubscription {
    type Item = Msg;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_next_unpin(cx)
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn check_subject(subject: &str) -> Result<(), TransportError> {
    if subject.is_empty() || subject.chars().any(char::is_whitespace) {
        return Err(TransportError::InvalidSubject {
            subject: subject.to_string(),
        });
    }
    Ok(())
}
