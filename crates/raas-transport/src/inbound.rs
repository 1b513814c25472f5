//! The input side of a call: turning a port subscription into a stream.
//!
//! An [`InputAdapter`] owns the subscription on one port and drives it on
//! its own task. Data frames become stream items; the terminal frame ends
//! the stream (normally, or with [`RaasError::Remote`]); pings are answered
//! on the peer's port; pongs are handed to the local keepalive through a
//! [`PongSignal`]. A port that stays silent longer than the idle timeout
//! fails the stream with [`RaasError::InputTimeout`].
//!
//! The subscription is released as soon as the adapter task stops, which
//! happens on the first of: a terminal condition (unless the adapter was
//! asked to keep serving pongs), the consumer dropping the stream, or the
//! cancellation token firing.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use raas_core::error::{RaasError, TransportErrorKind};
use raas_core::frame::{DISPOSE_MESSAGE, Frame};
use raas_core::port::Port;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, trace, warn};

use crate::traits::{Connection, ConnectionExt, Msg};

type InputItem = Result<Bytes, RaasError>;

/// The stream of data chunks arriving on a port.
///
/// Yields `Ok(chunk)` for each data frame in arrival order. The stream ends
/// with `None` on normal completion, or yields exactly one `Err` and then
/// ends.
#[derive(Debug)]
pub struct InputStream {
    receiver: mpsc::UnboundedReceiver<InputItem>,
}

impl InputStream {
    /// Create a stream that yields the given items and then ends.
    ///
    /// Useful for driving a handler without a connection.
    pub fn from_items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = InputItem>,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        for item in items {
            // The receiver is alive, so this cannot fail.
            let _ = sender.send(item);
        }
        Self { receiver }
    }

    /// Create a stream of data chunks that completes normally.
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self::from_items(chunks.into_iter().map(|chunk| Ok(chunk.into())))
    }

    /// Create a stream that completes immediately.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_items(std::iter::empty())
    }
}

impl Stream for InputStream {
    type Item = InputItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Notifications of pongs received on a port.
#[derive(Debug)]
pub struct PongSignal {
    receiver: mpsc::UnboundedReceiver<()>,
}

impl PongSignal {
    /// Wait for the next pong.
    ///
    /// Returns `None` once the adapter feeding this signal has stopped.
    pub async fn recv(&mut self) -> Option<()> {
        self.receiver.recv().await
    }
}

enum Event {
    Cancelled,
    ConsumerGone,
    Idle,
    Message(Option<Msg>),
}

/// Drives one port subscription and exposes it as an [`InputStream`].
pub struct InputAdapter<C: Connection> {
    conn: Arc<C>,
    port: Port,
    peer_port: Port,
    subscription: C::Subscription,
    idle_timeout: Duration,
    dispose_completes: bool,
    pongs: Option<mpsc::UnboundedSender<()>>,
    failure_token: Option<CancellationToken>,
}

impl<C: Connection> InputAdapter<C> {
    /// Create an adapter for an existing subscription on `port`.
    ///
    /// Pings arriving on `port` are answered on `peer_port`.
    pub fn new(
        conn: Arc<C>,
        port: Port,
        peer_port: Port,
        subscription: C::Subscription,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            conn,
            port,
            peer_port,
            subscription,
            idle_timeout,
            dispose_completes: false,
            pongs: None,
            failure_token: None,
        }
    }

    /// Route received pongs to the returned signal.
    ///
    /// An adapter with a pong signal keeps its subscription after the
    /// stream ends, so that the keepalive sharing the port keeps working
    /// until the cancellation token fires.
    pub fn with_pong_signal(&mut self) -> PongSignal {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.pongs = Some(sender);
        PongSignal { receiver }
    }

    /// Treat a terminal frame carrying the dispose message as normal
    /// completion instead of an error.
    #[must_use]
    pub const fn dispose_completes(mut self, enabled: bool) -> Self {
        self.dispose_completes = enabled;
        self
    }

    /// Cancel `token` when the stream ends with an error.
    #[must_use]
    pub fn cancel_on_failure(mut self, token: CancellationToken) -> Self {
        self.failure_token = Some(token);
        self
    }

    /// Start the adapter task and return the stream it feeds.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self, token: CancellationToken) -> InputStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(self.run(sender, token).in_current_span());
        InputStream { receiver }
    }

    async fn run(mut self, sender: mpsc::UnboundedSender<InputItem>, token: CancellationToken) {
        let linger = self.pongs.is_some();
        let mut sink = Some(sender);

        loop {
            let event = if let Some(sender) = &sink {
                tokio::select! {
                    biased;
                    () = token.cancelled() => Event::Cancelled,
                    () = sender.closed() => Event::ConsumerGone,
                    next = tokio::time::timeout(self.idle_timeout, self.subscription.next()) => {
                        next.map_or(Event::Idle, Event::Message)
                    }
                }
            } else {
                tokio::select! {
                    biased;
                    () = token.cancelled() => Event::Cancelled,
                    next = self.subscription.next() => Event::Message(next),
                }
            };

            match event {
                Event::Cancelled => {
                    trace!(port = %self.port, "input cancelled");
                    break;
                }
                Event::ConsumerGone => {
                    trace!(port = %self.port, "input consumer dropped");
                    sink = None;
                }
                Event::Idle => {
                    debug!(port = %self.port, timeout = ?self.idle_timeout, "input idle");
                    self.finish(
                        &mut sink,
                        Err(RaasError::InputTimeout {
                            timeout: self.idle_timeout,
                        }),
                    );
                }
                Event::Message(None) => {
                    if sink.is_some() {
                        self.finish(
                            &mut sink,
                            Err(RaasError::transport(
                                TransportErrorKind::ConnectionClosed,
                                format!("subscription on port {} ended", self.port),
                            )),
                        );
                    }
                    break;
                }
                Event::Message(Some(msg)) => {
                    if self.dispatch(&msg, &mut sink) {
                        let pong = self.conn.publish_frame(&self.peer_port, &Frame::pong()).await;
                        if let Err(e) = pong {
                            warn!(port = %self.peer_port, error = %e, "failed to answer ping");
                        }
                    }
                }
            }

            if sink.is_none() && !linger {
                break;
            }
        }

        let Self {
            port, subscription, ..
        } = self;
        drop(subscription);
        debug!(%port, "released input port");
    }

    /// Handle one message. Returns `true` if it was a ping that needs a pong.
    fn dispatch(&self, msg: &Msg, sink: &mut Option<mpsc::UnboundedSender<InputItem>>) -> bool {
        match Frame::decode(&msg.body) {
            Ok(Frame::Raw(chunk)) => match sink {
                Some(sender) => {
                    let _ = sender.send(Ok(chunk));
                }
                None => trace!(port = %self.port, "dropping data after stream end"),
            },
            Ok(Frame::Final(message)) => {
                if sink.is_none() {
                    trace!(port = %self.port, "dropping terminal frame after stream end");
                    return false;
                }
                let completes = message.is_empty()
                    || (self.dispose_completes && message == DISPOSE_MESSAGE);
                let result = if completes {
                    Ok(())
                } else {
                    Err(RaasError::remote(message))
                };
                self.finish(sink, result);
            }
            Ok(Frame::PingPong(true)) => return true,
            Ok(Frame::PingPong(false)) => match &self.pongs {
                Some(pongs) => {
                    let _ = pongs.send(());
                }
                None => trace!(port = %self.port, "ignoring unsolicited pong"),
            },
            Err(e) => {
                if sink.is_some() {
                    warn!(port = %self.port, error = %e, "malformed frame");
                    self.finish(sink, Err(e));
                }
            }
        }
        false
    }

    fn finish(&self, sink: &mut Option<mpsc::UnboundedSender<InputItem>>, result: Result<(), RaasError>) {
        let Some(sender) = sink.take() else {
            return;
        };
        match result {
            Ok(()) => trace!(port = %self.port, "input completed"),
            Err(e) => {
                debug!(port = %self.port, error = %e, "input failed");
                if let Some(token) = &self.failure_token {
                    token.cancel();
                }
                let _ = sender.send(Err(e));
            }
        }
    }
}
