//! RaaS client implementation.
//!
//! The [`Client`] opens calls to services registered anywhere on the bus.
//! Each call:
//!
//! 1. subscribes to a fresh client port,
//! 2. sends the port as a handshake request to the service name and waits
//!    (up to the handshake timeout) for the service port in the reply,
//! 3. publishes the caller's input to the service port on a background
//!    task, and
//! 4. exposes frames arriving on the client port as a [`CallStream`],
//!    answering the server's pings along the way.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use raas_core::config::ProtocolConfig;
use raas_core::error::{RaasError, Result, TransportErrorKind};
use raas_core::port::Port;
use raas_transport::{Connection, InputAdapter, OutputOutcome, OutputPublisher};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, trace};

use crate::call::CallStream;

/// Calls services over a connection.
pub struct Client<C: Connection> {
    conn: Arc<C>,
    config: ProtocolConfig,
}

impl<C: Connection> Client<C> {
    /// Create a client on a connection.
    ///
    /// # Errors
    ///
    /// Returns [`RaasError::Config`] if the configuration is unusable.
    pub fn new(conn: Arc<C>, config: ProtocolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { conn, config })
    }

    /// The client's timing configuration.
    #[must_use]
    pub const fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// The connection calls are made on.
    #[must_use]
    pub const fn connection(&self) -> &Arc<C> {
        &self.conn
    }

    /// Check if the underlying connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Call `service`, streaming `input` to it.
    ///
    /// Returns once the handshake succeeded; everything after that,
    /// including remote failures, arrives through the returned stream.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RaasError::HandshakeTimeout`] if no service answered in
    /// time, [`RaasError::InvalidHandshake`] if the reply is unusable, or a
    /// transport error.
    pub async fn call<S>(&self, service: &str, input: S) -> Result<CallStream>
    where
        S: Stream<Item = Result<Bytes, RaasError>> + Send + 'static,
    {
        let client_port = Port::generate();
        let subscription = self
            .conn
            .subscribe(client_port.as_str())
            .await
            .map_err(Into::<RaasError>::into)?;

        let timeout = self.config.handshake_timeout;
        let reply = match self.conn.request(service, client_port.to_bytes(), timeout).await {
            Ok(reply) => reply,
            Err(e) => {
                let err: RaasError = e.into();
                debug!(service, %client_port, error = %err, "handshake failed");
                if err.transport_kind() == Some(TransportErrorKind::Timeout) {
                    return Err(RaasError::HandshakeTimeout {
                        service: service.to_string(),
                        timeout,
                    });
                }
                return Err(err);
            }
        };
        let service_port = Port::from_bytes(&reply.body)?;

        let span = debug_span!("call", service, %client_port, %service_port);
        span.in_scope(|| debug!("handshake complete"));

        let token = CancellationToken::new();
        let publisher = OutputPublisher::new(Arc::clone(&self.conn), service_port.clone());
        let pump_token = token.clone();
        tokio::spawn(
            async move {
                match publisher.pump(input, pump_token).await {
                    OutputOutcome::Completed => trace!("input completed"),
                    OutputOutcome::Failed(e) => debug!(error = %e, "input failed"),
                    OutputOutcome::Cancelled => trace!("input disposed"),
                }
            }
            .instrument(span.clone()),
        );

        let adapter = InputAdapter::new(
            Arc::clone(&self.conn),
            client_port.clone(),
            service_port.clone(),
            subscription,
            self.config.input_timeout,
        )
        .cancel_on_failure(token.clone());
        let output = span.in_scope(|| adapter.spawn(token.clone()));

        Ok(CallStream::new(output, client_port, service_port, token.drop_guard()))
    }

    /// Publish raw bytes to a subject, outside of any call.
    ///
    /// # Errors
    ///
    /// Returns the transport error if publishing failed.
    pub async fn publish(&self, subject: &str, body: impl Into<Bytes>) -> Result<()> {
        self.conn
            .publish(subject, body.into())
            .await
            .map_err(Into::into)
    }

    /// Subscribe to raw messages on a subject, outside of any call.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the subscription failed.
    pub async fn subscribe(&self, subject: &str) -> Result<RawSubscription<C>> {
        let inner = self
            .conn
            .subscribe(subject)
            .await
            .map_err(Into::<RaasError>::into)?;
        Ok(RawSubscription { inner })
    }
}

/// Message bodies published to a subject.
///
/// Dropping the subscription unsubscribes.
pub struct RawSubscription<C: Connection> {
    inner: C::Subscription,
}

impl<C: Connection> Stream for RawSubscription<C> {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx).map(|msg| msg.map(|msg| msg.body))
    }
}
