//! The output side of a call: publishing a stream to the peer's port.
//!
//! An [`OutputPublisher`] sends each chunk as a data frame and guarantees
//! that at most one terminal frame is ever published on its port, whether
//! the stream completes, fails, or is cancelled.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use raas_core::error::RaasError;
use raas_core::frame::Frame;
use raas_core::port::Port;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::traits::{Connection, ConnectionExt};

/// How a pumped output stream ended.
#[derive(Debug)]
pub enum OutputOutcome {
    /// The stream completed and an empty terminal frame was sent.
    Completed,
    /// The stream failed and an error terminal frame was sent.
    Failed(RaasError),
    /// The cancellation token fired and a dispose frame was sent.
    Cancelled,
}

impl OutputOutcome {
    /// Check whether the stream completed normally.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Publishes frames to one port.
pub struct OutputPublisher<C: Connection> {
    conn: Arc<C>,
    port: Port,
    finished: bool,
    sent: u64,
}

impl<C: Connection> OutputPublisher<C> {
    /// Create a publisher targeting `port`.
    pub fn new(conn: Arc<C>, port: Port) -> Self {
        Self {
            conn,
            port,
            finished: false,
            sent: 0,
        }
    }

    /// The port this publisher writes to.
    #[must_use]
    pub fn port(&self) -> &Port {
        &self.port
    }

    /// Whether a terminal frame has been sent.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of data frames published so far.
    #[must_use]
    pub const fn chunks_sent(&self) -> u64 {
        self.sent
    }

    /// Publish one data frame.
    ///
    /// # Errors
    ///
    /// Returns the transport error if publishing failed.
    pub async fn send(&mut self, chunk: Bytes) -> Result<(), RaasError> {
        debug_assert!(!self.finished, "data frame after terminal frame");
        if self.finished {
            return Ok(());
        }
        self.conn.publish_frame(&self.port, &Frame::Raw(chunk)).await?;
        self.sent += 1;
        Ok(())
    }

    /// Publish the normal-completion terminal frame.
    pub async fn complete(&mut self) -> bool {
        self.finish(Frame::complete()).await
    }

    /// Publish an error terminal frame describing `err`.
    pub async fn fail(&mut self, err: &RaasError) -> bool {
        self.finish(Frame::error(err.final_message())).await
    }

    /// Publish the dispose terminal frame.
    pub async fn dispose(&mut self) -> bool {
        self.finish(Frame::dispose()).await
    }

    /// Publish a terminal frame unless one was already sent.
    ///
    /// Returns `true` if this call sent it. A failed publish still counts
    /// as finished, since nothing further may follow it.
    async fn finish(&mut self, frame: Frame) -> bool {
        if self.finished {
            return false;
        }
        self.finished = true;
        trace!(port = %self.port, chunks = self.sent, kind = frame.name(), "sending terminal frame");
        if let Err(e) = self.conn.publish_frame(&self.port, &frame).await {
            warn!(port = %self.port, error = %e, "failed to send terminal frame");
        }
        true
    }

    /// Publish every item of `output` until it ends or `token` fires.
    pub async fn pump<S>(self, output: S, token: CancellationToken) -> OutputOutcome
    where
        S: Stream<Item = Result<Bytes, RaasError>> + Send,
    {
        self.pump_until(output, token, std::future::pending()).await
    }

    /// Like [`pump`](Self::pump), but also stops with an error terminal
    /// frame when `abort` resolves first.
    pub async fn pump_until<S, F>(
        mut self,
        output: S,
        token: CancellationToken,
        abort: F,
    ) -> OutputOutcome
    where
        S: Stream<Item = Result<Bytes, RaasError>> + Send,
        F: Future<Output = RaasError> + Send,
    {
        let mut output = pin!(output);
        let mut abort = pin!(abort);
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    self.dispose().await;
                    return OutputOutcome::Cancelled;
                }
                err = &mut abort => {
                    self.fail(&err).await;
                    return OutputOutcome::Failed(err);
                }
                item = output.next() => match item {
                    Some(Ok(chunk)) => {
                        if let Err(e) = self.send(chunk).await {
                            self.fail(&e).await;
                            return OutputOutcome::Failed(e);
                        }
                    }
                    Some(Err(e)) => {
                        self.fail(&e).await;
                        return OutputOutcome::Failed(e);
                    }
                    None => {
                        self.complete().await;
                        return OutputOutcome::Completed;
                    }
                },
            }
        }
    }
}

impl<C: Connection> Drop for OutputPublisher<C> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(port = %self.port, "output publisher dropped without a terminal frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryBus, MemoryConnection, MemorySubscription};
    use pretty_assertions::assert_eq;

    async fn setup() -> (Arc<MemoryConnection>, Port, MemorySubscription) {
        let bus = MemoryBus::new();
        let conn = Arc::new(bus.connect());
        let port = Port::generate();
        let sub = conn.subscribe(port.as_str()).await.unwrap();
        (conn, port, sub)
    }

    async fn frames(sub: &mut MemorySubscription, n: usize) -> Vec<Frame> {
        let mut out = Vec::new();
        for _ in 0..n {
            out.push(Frame::decode(&sub.next().await.unwrap().body).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_pump_completes() {
        let (conn, port, mut sub) = setup().await;
        let publisher = OutputPublisher::new(conn, port);
        let output = futures::stream::iter([Ok(Bytes::from_static(b"a")), Ok(Bytes::from_static(b"b"))]);

        let outcome = publisher.pump(output, CancellationToken::new()).await;
        assert!(outcome.is_completed());
        assert_eq!(
            frames(&mut sub, 3).await,
            vec![Frame::raw(&b"a"[..]), Frame::raw(&b"b"[..]), Frame::complete()]
        );
    }

    #[tokio::test]
    async fn test_pump_forwards_error_text() {
        let (conn, port, mut sub) = setup().await;
        let publisher = OutputPublisher::new(conn, port);
        let output = futures::stream::iter([
            Ok(Bytes::from_static(b"a")),
            Err(RaasError::service("boom")),
        ]);

        let outcome = publisher.pump(output, CancellationToken::new()).await;
        assert!(matches!(outcome, OutputOutcome::Failed(RaasError::Service { .. })));
        assert_eq!(
            frames(&mut sub, 2).await,
            vec![Frame::raw(&b"a"[..]), Frame::error("boom")]
        );
    }

    #[tokio::test]
    async fn test_pump_disposes_on_cancel() {
        let (conn, port, mut sub) = setup().await;
        let publisher = OutputPublisher::new(conn, port);
        let token = CancellationToken::new();

        let task = tokio::spawn(publisher.pump(futures::stream::pending(), token.clone()));
        token.cancel();

        assert!(matches!(task.await.unwrap(), OutputOutcome::Cancelled));
        assert_eq!(frames(&mut sub, 1).await, vec![Frame::dispose()]);
    }

    #[tokio::test]
    async fn test_pump_until_abort() {
        let (conn, port, mut sub) = setup().await;
        let publisher = OutputPublisher::new(conn, port);
        let abort = async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            RaasError::PeerUnresponsive {
                timeout: std::time::Duration::from_millis(10),
            }
        };

        let outcome = publisher
            .pump_until(futures::stream::pending(), CancellationToken::new(), abort)
            .await;
        assert!(matches!(outcome, OutputOutcome::Failed(RaasError::PeerUnresponsive { .. })));
        assert_eq!(
            frames(&mut sub, 1).await,
            vec![Frame::error("peer unresponsive: no pong within 10ms")]
        );
    }

    #[tokio::test]
    async fn test_chunks_sent_counts_data_frames() {
        let (conn, port, mut sub) = setup().await;
        let mut publisher = OutputPublisher::new(conn, port);

        publisher.send(Bytes::from_static(b"a")).await.unwrap();
        publisher.send(Bytes::from_static(b"b")).await.unwrap();
        assert_eq!(publisher.chunks_sent(), 2);

        // The terminal frame is not a data frame.
        assert!(publisher.complete().await);
        assert_eq!(publisher.chunks_sent(), 2);
        assert_eq!(frames(&mut sub, 3).await.last(), Some(&Frame::complete()));
    }

    #[tokio::test]
    async fn test_single_terminal_frame() {
        let (conn, port, mut sub) = setup().await;
        let mut publisher = OutputPublisher::new(conn, port);

        assert!(publisher.complete().await);
        assert!(!publisher.dispose().await);
        assert!(!publisher.fail(&RaasError::service("late")).await);
        assert!(publisher.is_finished());

        assert_eq!(frames(&mut sub, 1).await, vec![Frame::complete()]);
        let extra = tokio::time::timeout(std::time::Duration::from_millis(20), sub.next()).await;
        assert!(extra.is_err());
    }
}
