//! Liveness probing for calls.
//!
//! The side that owns a call's output runs a [`Keepalive`]: every
//! `ping_interval` it publishes a ping on the peer's port, on a fixed
//! cadence that does not depend on how fast pongs come back. A ping sent
//! while no pong is awaited arms a deadline; any pong clears it. The
//! probe fails when a deadline passes without a pong.

use std::sync::Arc;
use std::time::Duration;

use raas_core::config::ProtocolConfig;
use raas_core::error::RaasError;
use raas_core::frame::Frame;
use raas_core::port::Port;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::inbound::PongSignal;
use crate::traits::{Connection, ConnectionExt};

/// Periodic ping/pong exchange with a peer.
pub struct Keepalive<C: Connection> {
    conn: Arc<C>,
    peer_port: Port,
    interval: Duration,
    pong_timeout: Duration,
    pongs: PongSignal,
}

impl<C: Connection> Keepalive<C> {
    /// Create a keepalive pinging `peer_port` and listening on `pongs`.
    ///
    /// Pings go out every `config.ping_interval`; each must be answered
    /// within `config.handshake_timeout`.
    pub fn new(conn: Arc<C>, peer_port: Port, config: &ProtocolConfig, pongs: PongSignal) -> Self {
        Self {
            conn,
            peer_port,
            interval: config.ping_interval,
            pong_timeout: config.handshake_timeout,
            pongs,
        }
    }

    /// Override the pong deadline.
    #[must_use]
    pub const fn with_pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    /// Probe until the peer stops answering.
    ///
    /// Never returns while the peer is alive; callers race it against the
    /// call's other work and drop it when the call ends. Resolves to
    /// [`RaasError::PeerUnresponsive`] when a pong misses its deadline, or
    /// to the transport error if a ping cannot be published.
    pub async fn run(mut self) -> RaasError {
        let mut ticks = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut deadline: Option<Instant> = None;
        let mut pings: u64 = 0;

        loop {
            tokio::select! {
                biased;
                () = sleep_until(deadline) => {
                    debug!(port = %self.peer_port, pings, timeout = ?self.pong_timeout, "peer unresponsive");
                    return self.unresponsive();
                }
                pong = self.pongs.recv() => {
                    if pong.is_none() {
                        debug!(port = %self.peer_port, pings, "pong signal closed");
                        return self.unresponsive();
                    }
                    trace!(pings, "received pong");
                    deadline = None;
                }
                _ = ticks.tick() => {
                    if let Err(e) = self.conn.publish_frame(&self.peer_port, &Frame::ping()).await {
                        debug!(port = %self.peer_port, error = %e, "failed to send ping");
                        return e;
                    }
                    pings += 1;
                    trace!(port = %self.peer_port, pings, "sent ping");
                    deadline.get_or_insert_with(|| Instant::now() + self.pong_timeout);
                }
            }
        }
    }

    fn unresponsive(&self) -> RaasError {
        RaasError::PeerUnresponsive {
            timeout: self.pong_timeout,
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
