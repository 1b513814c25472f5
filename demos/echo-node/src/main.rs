//! Echo node demo.
//!
//! Runs a single node on an in-memory bus, registers an `echo` and a
//! `shout` service, then calls them and prints what comes back along with
//! the registration counters. The node's connection is wrapped in the
//! logging middleware, so `RUST_LOG=raas_transport=debug` shows every
//! publish and subscription.
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=raas=debug cargo run -p echo-node
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, stream};
use raas::prelude::*;
use raas::telemetry;
use raas::transport::middleware::{LayerStack, LoggingLayer};
use raas::Bytes;
use tracing::info;

fn words(items: &[&'static str]) -> impl futures::Stream<Item = Result<Bytes, RaasError>> + Send + 'static {
    stream::iter(items.to_vec()).map(|w| Ok(Bytes::from_static(w.as_bytes())))
}

#[tokio::main]
async fn main() -> Result<(), RaasError> {
    telemetry::init_tracing("echo_node=info,raas=info")?;

    let bus = MemoryBus::new();
    let protocol = ProtocolConfig::new()
        .with_handshake_timeout(Duration::from_secs(1))
        .with_ping_interval(Duration::from_millis(250));
    let conn = Arc::new(
        LayerStack::new(bus.connect())
            .with(LoggingLayer::default())
            .into_inner(),
    );
    let node = Node::new(Arc::clone(&conn), ServerConfig::new().with_protocol(protocol))?;

    let mut echo = node.register("echo", |input: InputStream| input).await?;
    let _shout = node
        .register(
            "shout",
            with_context(|ctx: CallContext, input: InputStream| {
                info!(service = ctx.service(), client_port = %ctx.client_port(), "shouting");
                input.map(|chunk| chunk.map(|b| Bytes::from(b.to_ascii_uppercase())))
            }),
        )
        .await?;

    let mut call = node.call("echo", words(&["hello", "over", "pubsub"])).await?;
    while let Some(chunk) = call.next().await {
        println!("echo  <- {}", String::from_utf8_lossy(&chunk?));
    }

    let shouted: Vec<Bytes> = node
        .call("shout", words(&["quiet", "please"]))
        .await?
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_, _>>()?;
    for chunk in shouted {
        println!("shout <- {}", String::from_utf8_lossy(&chunk));
    }

    match node.call("missing", words(&[])).await {
        Ok(_) => println!("unexpected answer from 'missing'"),
        Err(e) => println!("missing -> {e}"),
    }

    // Counters arrive asynchronously; skip to the latest.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut latest = echo.info();
    while let Ok(Some(info)) = tokio::time::timeout(Duration::from_millis(10), echo.next()).await {
        latest = info;
    }
    println!(
        "echo counters: called={} completed={} errors={}",
        latest.called_num, latest.completed_num, latest.error_num
    );

    println!(
        "connection: published={} received={} subscriptions={}",
        conn.messages_published(),
        conn.messages_received(),
        conn.subscriptions_opened()
    );

    node.close().await
}
