//! Client call tests against a hand-driven fake service.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::{StreamExt, stream};
use pretty_assertions::assert_eq;
use raas_client::Client;
use raas_core::{ErrorKind, Frame, Port, ProtocolConfig, RaasError};
use raas_transport::{
    Connection, ConnectionExt, MemoryBus, MemoryConnection, MemorySubscription,
};

const WAIT: Duration = Duration::from_secs(2);

fn client(bus: &MemoryBus, config: ProtocolConfig) -> Client<MemoryConnection> {
    Client::new(Arc::new(bus.connect()), config).unwrap()
}

fn no_input() -> impl futures::Stream<Item = Result<Bytes, RaasError>> + Send + 'static {
    stream::pending()
}

/// The service end of one accepted call.
struct Accepted {
    conn: MemoryConnection,
    client_port: Port,
    inbox: MemorySubscription,
}

impl Accepted {
    async fn send(&self, frame: Frame) {
        self.conn.publish_frame(&self.client_port, &frame).await.unwrap();
    }

    async fn recv(&mut self) -> Frame {
        let msg = tokio::time::timeout(WAIT, self.inbox.next())
            .await
            .expect("frame in time")
            .expect("subscription open");
        Frame::decode(&msg.body).unwrap()
    }
}

/// Answers handshakes on a subject the way a server would.
struct FakeService {
    conn: MemoryConnection,
    handshakes: MemorySubscription,
}

impl FakeService {
    async fn new(bus: &MemoryBus, name: &str) -> Self {
        let conn = bus.connect();
        let handshakes = conn.subscribe(name).await.unwrap();
        Self { conn, handshakes }
    }

    async fn accept(mut self) -> Accepted {
        let msg = self.handshakes.next().await.unwrap();
        let client_port = Port::from_bytes(&msg.body).unwrap();
        let service_port = Port::generate();
        let inbox = self.conn.subscribe(service_port.as_str()).await.unwrap();
        self.conn
            .publish(&msg.reply_to.unwrap(), service_port.to_bytes())
            .await
            .unwrap();
        Accepted {
            conn: self.conn,
            client_port,
            inbox,
        }
    }
}

// =============================================================================
// Handshake
// =============================================================================

#[tokio::test]
async fn test_handshake_timeout_releases_ports() {
    let bus = MemoryBus::new();
    let client = client(
        &bus,
        ProtocolConfig::new().with_handshake_timeout(Duration::from_millis(100)),
    );

    let started = Instant::now();
    let err = client.call("missing", no_input()).await.unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.kind(), ErrorKind::HandshakeTimeout);
    assert!(elapsed >= Duration::from_millis(100), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(1), "returned after {elapsed:?}");
    assert_eq!(bus.subscription_count(), 0);
}

#[tokio::test]
async fn test_unusable_reply_is_rejected() {
    let bus = MemoryBus::new();
    let client = client(&bus, ProtocolConfig::default());
    let conn = bus.connect();
    let mut handshakes = conn.subscribe("broken").await.unwrap();

    let responder = tokio::spawn(async move {
        let msg = handshakes.next().await.unwrap();
        conn.publish(&msg.reply_to.unwrap(), Bytes::from_static(b"not a port"))
            .await
            .unwrap();
    });

    let err = client.call("broken", no_input()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidHandshake);
    responder.await.unwrap();
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test]
async fn test_bidirectional_streaming() {
    let bus = MemoryBus::new();
    let client = client(&bus, ProtocolConfig::default());
    let service = FakeService::new(&bus, "svc").await;
    let accept = tokio::spawn(service.accept());

    let input = stream::iter([Ok(Bytes::from_static(b"a")), Ok(Bytes::from_static(b"b"))]);
    let mut call = client.call("svc", input).await.unwrap();
    let mut accepted = accept.await.unwrap();
    assert_eq!(call.client_port(), &accepted.client_port);

    assert_eq!(accepted.recv().await, Frame::raw(&b"a"[..]));
    assert_eq!(accepted.recv().await, Frame::raw(&b"b"[..]));
    assert_eq!(accepted.recv().await, Frame::complete());

    accepted.send(Frame::raw(&b"x"[..])).await;
    accepted.send(Frame::complete()).await;

    assert_eq!(call.next().await.unwrap().unwrap(), Bytes::from_static(b"x"));
    assert!(call.next().await.is_none());
}

#[tokio::test]
async fn test_remote_error_keeps_message() {
    let bus = MemoryBus::new();
    let client = client(&bus, ProtocolConfig::default());
    let service = FakeService::new(&bus, "svc").await;
    let accept = tokio::spawn(service.accept());

    let mut call = client.call("svc", no_input()).await.unwrap();
    let accepted = accept.await.unwrap();
    accepted.send(Frame::error("division by zero")).await;

    let err = call.next().await.unwrap().unwrap_err();
    assert!(matches!(err, RaasError::Remote { ref message } if message == "division by zero"));
    assert!(call.next().await.is_none());
}

#[tokio::test]
async fn test_server_dispose_is_an_error() {
    let bus = MemoryBus::new();
    let client = client(&bus, ProtocolConfig::default());
    let service = FakeService::new(&bus, "svc").await;
    let accept = tokio::spawn(service.accept());

    let mut call = client.call("svc", no_input()).await.unwrap();
    let accepted = accept.await.unwrap();
    accepted.send(Frame::dispose()).await;

    let err = call.next().await.unwrap().unwrap_err();
    assert!(matches!(err, RaasError::Remote { ref message } if message == "dispose"));
}

#[tokio::test]
async fn test_client_answers_pings() {
    let bus = MemoryBus::new();
    let client = client(&bus, ProtocolConfig::default());
    let service = FakeService::new(&bus, "svc").await;
    let accept = tokio::spawn(service.accept());

    let _call = client.call("svc", no_input()).await.unwrap();
    let mut accepted = accept.await.unwrap();

    accepted.send(Frame::ping()).await;
    assert_eq!(accepted.recv().await, Frame::pong());
}

// =============================================================================
// Termination
// =============================================================================

#[tokio::test]
async fn test_input_timeout_disposes_call() {
    let bus = MemoryBus::new();
    let client = client(
        &bus,
        ProtocolConfig::new()
            .with_input_timeout(Duration::from_millis(50))
            .with_ping_interval(Duration::from_millis(10)),
    );
    let service = FakeService::new(&bus, "svc").await;
    let accept = tokio::spawn(service.accept());

    let mut call = client.call("svc", no_input()).await.unwrap();
    let mut accepted = accept.await.unwrap();

    let err = call.next().await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InputTimeout);
    assert_eq!(accepted.recv().await, Frame::dispose());
}

#[tokio::test]
async fn test_dropping_call_disposes_input() {
    let bus = MemoryBus::new();
    let client = client(&bus, ProtocolConfig::default());
    let service = FakeService::new(&bus, "svc").await;
    let accept = tokio::spawn(service.accept());

    let call = client.call("svc", no_input()).await.unwrap();
    let mut accepted = accept.await.unwrap();
    let client_port = call.client_port().clone();

    drop(call);
    assert_eq!(accepted.recv().await, Frame::dispose());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!bus.has_subscribers(client_port.as_str()));
}

#[tokio::test]
async fn test_completed_input_is_not_disposed() {
    let bus = MemoryBus::new();
    let client = client(&bus, ProtocolConfig::default());
    let service = FakeService::new(&bus, "svc").await;
    let accept = tokio::spawn(service.accept());

    let call = client.call("svc", stream::empty()).await.unwrap();
    let mut accepted = accept.await.unwrap();
    assert_eq!(accepted.recv().await, Frame::complete());

    drop(call);
    let extra = tokio::time::timeout(Duration::from_millis(50), accepted.inbox.next()).await;
    assert!(extra.is_err(), "no frame may follow the terminal frame");
}

// =============================================================================
// Raw pub/sub
// =============================================================================

#[tokio::test]
async fn test_raw_publish_subscribe() {
    let bus = MemoryBus::new();
    let client = client(&bus, ProtocolConfig::default());

    let mut sub = client.subscribe("events").await.unwrap();
    client.publish("events", &b"tick"[..]).await.unwrap();

    assert_eq!(sub.next().await.unwrap(), Bytes::from_static(b"tick"));
}
