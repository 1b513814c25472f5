//! Server session tests.
//!
//! These drive a registered service over a bare memory connection,
//! speaking the wire protocol by hand, so that the server side is checked
//! independently of the client crate.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{StreamExt, stream};
use pretty_assertions::assert_eq;
use raas_core::{Frame, Port, ProtocolConfig, RaasError, ServiceInfo};
use raas_server::{InputStream, Registration, Server, ServerConfig};
use raas_transport::{
    Connection, ConnectionExt, MemoryBus, MemoryConnection, MemorySubscription,
};

const WAIT: Duration = Duration::from_secs(2);

struct Peer {
    conn: MemoryConnection,
    client_port: Port,
    service_port: Port,
    inbox: MemorySubscription,
}

impl Peer {
    async fn handshake(bus: &MemoryBus, service: &str) -> Self {
        let conn = bus.connect();
        let client_port = Port::generate();
        let inbox = conn.subscribe(client_port.as_str()).await.unwrap();
        let reply = conn
            .request(service, client_port.to_bytes(), WAIT)
            .await
            .unwrap();
        let service_port = Port::from_bytes(&reply.body).unwrap();
        Self {
            conn,
            client_port,
            service_port,
            inbox,
        }
    }

    async fn send(&self, frame: Frame) {
        self.conn.publish_frame(&self.service_port, &frame).await.unwrap();
    }

    async fn recv(&mut self) -> Frame {
        let msg = tokio::time::timeout(WAIT, self.inbox.next())
            .await
            .expect("frame in time")
            .expect("subscription open");
        Frame::decode(&msg.body).unwrap()
    }

    /// Next frame that is not a ping.
    async fn recv_data(&mut self) -> Frame {
        loop {
            let frame = self.recv().await;
            if frame != Frame::ping() {
                return frame;
            }
        }
    }
}

fn server(bus: &MemoryBus, protocol: ProtocolConfig) -> Server<MemoryConnection> {
    Server::new(
        Arc::new(bus.connect()),
        ServerConfig::new().with_protocol(protocol),
    )
    .unwrap()
}

async fn next_info(registration: &mut Registration) -> ServiceInfo {
    tokio::time::timeout(WAIT, registration.next())
        .await
        .expect("snapshot in time")
        .expect("registration alive")
}

// =============================================================================
// Normal operation
// =============================================================================

#[tokio::test]
async fn test_echo_over_the_wire() {
    let bus = MemoryBus::new();
    let server = server(&bus, ProtocolConfig::default());
    let mut registration = server
        .register("echo", |input: InputStream| input)
        .await
        .unwrap();

    let mut peer = Peer::handshake(&bus, "echo").await;
    assert_eq!(next_info(&mut registration).await, ServiceInfo::new(1, 0, 0));

    peer.send(Frame::raw(&b"a"[..])).await;
    peer.send(Frame::raw(&b"b"[..])).await;
    peer.send(Frame::complete()).await;

    assert_eq!(peer.recv_data().await, Frame::raw(&b"a"[..]));
    assert_eq!(peer.recv_data().await, Frame::raw(&b"b"[..]));
    assert_eq!(peer.recv_data().await, Frame::complete());
    assert_eq!(next_info(&mut registration).await, ServiceInfo::new(1, 1, 0));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!bus.has_subscribers(peer.service_port.as_str()));
}

#[tokio::test]
async fn test_client_ping_is_answered() {
    let bus = MemoryBus::new();
    let server = server(&bus, ProtocolConfig::default());
    let _registration = server
        .register("echo", |input: InputStream| input)
        .await
        .unwrap();

    let mut peer = Peer::handshake(&bus, "echo").await;
    peer.send(Frame::ping()).await;
    assert_eq!(peer.recv().await, Frame::pong());
}

#[tokio::test]
async fn test_dispose_completes_handler_input() {
    let bus = MemoryBus::new();
    let server = server(&bus, ProtocolConfig::default());
    let mut registration = server
        .register("echo", |input: InputStream| input)
        .await
        .unwrap();

    let mut peer = Peer::handshake(&bus, "echo").await;
    next_info(&mut registration).await;

    peer.send(Frame::raw(&b"partial"[..])).await;
    peer.send(Frame::dispose()).await;

    assert_eq!(peer.recv_data().await, Frame::raw(&b"partial"[..]));
    assert_eq!(peer.recv_data().await, Frame::complete());
    assert_eq!(next_info(&mut registration).await, ServiceInfo::new(1, 1, 0));
}

// =============================================================================
// Failures contained in the call
// =============================================================================

#[tokio::test]
async fn test_handler_error_becomes_final_message() {
    let bus = MemoryBus::new();
    let server = server(&bus, ProtocolConfig::default());
    let mut registration = server
        .register("fail", |_input: InputStream| {
            stream::iter([Ok(Bytes::from_static(b"x")), Err(RaasError::service("bad input"))])
        })
        .await
        .unwrap();

    let mut peer = Peer::handshake(&bus, "fail").await;
    assert_eq!(peer.recv_data().await, Frame::raw(&b"x"[..]));
    assert_eq!(peer.recv_data().await, Frame::error("bad input"));

    next_info(&mut registration).await;
    assert_eq!(next_info(&mut registration).await, ServiceInfo::new(1, 0, 1));
}

#[tokio::test]
async fn test_input_timeout_reaches_handler() {
    let bus = MemoryBus::new();
    let protocol = ProtocolConfig::new()
        .with_input_timeout(Duration::from_millis(50))
        .with_ping_interval(Duration::from_secs(5));
    let server = server(&bus, protocol);
    let mut registration = server
        .register("echo", |input: InputStream| input)
        .await
        .unwrap();

    let mut peer = Peer::handshake(&bus, "echo").await;
    assert_eq!(
        peer.recv_data().await,
        Frame::error("input timed out after 50ms without a frame")
    );

    next_info(&mut registration).await;
    assert_eq!(next_info(&mut registration).await, ServiceInfo::new(1, 0, 1));
}

#[tokio::test]
async fn test_keepalive_fails_silent_client() {
    let bus = MemoryBus::new();
    let protocol = ProtocolConfig::new()
        .with_ping_interval(Duration::from_millis(30))
        .with_handshake_timeout(Duration::from_millis(60));
    let server = server(&bus, protocol);
    let mut registration = server
        .register("slow", |_input: InputStream| stream::pending::<Result<Bytes, RaasError>>())
        .await
        .unwrap();

    let mut peer = Peer::handshake(&bus, "slow").await;

    // Answer two pings, then go quiet.
    for _ in 0..2 {
        assert_eq!(peer.recv().await, Frame::ping());
        peer.send(Frame::pong()).await;
    }
    assert_eq!(peer.recv().await, Frame::ping());
    assert_eq!(
        peer.recv().await,
        Frame::error("peer unresponsive: no pong within 60ms")
    );

    next_info(&mut registration).await;
    assert_eq!(next_info(&mut registration).await, ServiceInfo::new(1, 0, 1));
}

#[tokio::test]
async fn test_invalid_handshakes_are_dropped() {
    let bus = MemoryBus::new();
    let server = server(&bus, ProtocolConfig::default());
    let registration = server
        .register("echo", |input: InputStream| input)
        .await
        .unwrap();
    let conn = bus.connect();

    // No reply subject.
    conn.publish("echo", Port::generate().to_bytes()).await.unwrap();
    // Empty port.
    let result = conn
        .request("echo", Bytes::new(), Duration::from_millis(50))
        .await;
    assert!(result.is_err());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(registration.info(), ServiceInfo::default());
}

// =============================================================================
// Registration lifecycle
// =============================================================================

#[tokio::test]
async fn test_dropping_registration_disposes_calls() {
    let bus = MemoryBus::new();
    let server = server(&bus, ProtocolConfig::default());
    let mut registration = server
        .register("slow", |_input: InputStream| stream::pending::<Result<Bytes, RaasError>>())
        .await
        .unwrap();

    let mut peer = Peer::handshake(&bus, "slow").await;
    assert_eq!(next_info(&mut registration).await, ServiceInfo::new(1, 0, 0));

    drop(registration);
    assert_eq!(peer.recv_data().await, Frame::dispose());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!bus.has_subscribers("slow"));
    assert!(!bus.has_subscribers(peer.service_port.as_str()));
    assert!(bus.has_subscribers(peer.client_port.as_str()));
}

#[tokio::test]
async fn test_queue_group_shares_calls() {
    let bus = MemoryBus::new();
    let server = server(&bus, ProtocolConfig::default());
    let first = server
        .register("echo", |input: InputStream| input)
        .await
        .unwrap();
    let second = server
        .register("echo", |input: InputStream| input)
        .await
        .unwrap();

    let mut peers = Vec::new();
    for _ in 0..4 {
        peers.push(Peer::handshake(&bus, "echo").await);
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(first.info().called_num, 2);
    assert_eq!(second.info().called_num, 2);
}
