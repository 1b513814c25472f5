//! Service registration.
//!
//! A [`Server`] binds service names to handlers on a connection. Each
//! [`Server::register`] call subscribes to the service name (as a member
//! of the configured queue group), accepts handshakes on that
//! subscription and runs one session per call.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use raas_core::config::ProtocolConfig;
use raas_core::error::{RaasError, Result};
use raas_core::info::ServiceInfo;
use raas_transport::Connection;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Instrument, debug, debug_span, field, info, trace, warn};

use crate::info::InfoAggregator;
use crate::service::Service;
use crate::session::{self, SessionEnv};

/// Default queue group for service subscriptions.
pub const DEFAULT_QUEUE_GROUP: &str = "service";

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Call timing.
    pub protocol: ProtocolConfig,
    /// Queue group joined by service subscriptions, or `None` to receive
    /// every handshake on every registration.
    pub queue_group: Option<String>,
}

impl ServerConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the call timing.
    #[must_use]
    pub fn with_protocol(mut self, protocol: ProtocolConfig) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the queue group.
    #[must_use]
    pub fn with_queue_group(mut self, group: impl Into<String>) -> Self {
        self.queue_group = Some(group.into());
        self
    }

    /// Subscribe to service names without a queue group.
    #[must_use]
    pub fn without_queue_group(mut self) -> Self {
        self.queue_group = None;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolConfig::default(),
            queue_group: Some(DEFAULT_QUEUE_GROUP.to_string()),
        }
    }
}

/// Registers services on a connection.
pub struct Server<C: Connection> {
    conn: Arc<C>,
    config: ServerConfig,
}

impl<C: Connection> Server<C> {
    /// Create a server on a connection.
    ///
    /// # Errors
    ///
    /// Returns [`RaasError::Config`] if the configuration is unusable.
    pub fn new(conn: Arc<C>, config: ServerConfig) -> Result<Self> {
        config.protocol.validate()?;
        Ok(Self { conn, config })
    }

    /// The server's configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The connection services are registered on.
    #[must_use]
    pub const fn connection(&self) -> &Arc<C> {
        &self.conn
    }

    /// Bind `name` to `service`.
    ///
    /// The registration accepts calls until it is dropped. Dropping it
    /// also cancels its running calls, each of which sends a dispose
    /// frame to its client.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or the subscription fails.
    pub async fn register<S: Service>(
        &self,
        name: impl Into<String>,
        service: S,
    ) -> Result<Registration> {
        let name: Arc<str> = Arc::from(name.into());
        if name.is_empty() {
            return Err(RaasError::config("service name must not be empty"));
        }

        let subscription = match &self.config.queue_group {
            Some(group) => self.conn.subscribe_queue(&name, group).await,
            None => self.conn.subscribe(&name).await,
        }
        .map_err(Into::<RaasError>::into)?;

        let info = Arc::new(InfoAggregator::new());
        let snapshots = snapshot_stream(info.subscribe());
        let env = Arc::new(SessionEnv {
            conn: Arc::clone(&self.conn),
            service,
            name: Arc::clone(&name),
            config: self.config.protocol.clone(),
            info: Arc::clone(&info),
        });

        let token = CancellationToken::new();
        let span = debug_span!("registration", service = %name);
        tokio::spawn(accept(env, subscription, token.clone()).instrument(span));
        info!(service = %name, group = ?self.config.queue_group, "service registered");

        Ok(Registration {
            name,
            info,
            snapshots,
            _guard: token.drop_guard(),
        })
    }
}

async fn accept<C, S>(env: Arc<SessionEnv<C, S>>, mut subscription: C::Subscription, token: CancellationToken)
where
    C: Connection,
    S: Service,
{
    loop {
        let handshake = tokio::select! {
            biased;
            () = token.cancelled() => break,
            msg = subscription.next() => msg,
        };
        let Some(handshake) = handshake else {
            warn!("service subscription ended");
            break;
        };

        let span = debug_span!(
            "call",
            service = %env.name,
            client_port = field::Empty,
            service_port = field::Empty,
        );
        tokio::spawn(session::serve(Arc::clone(&env), handshake, token.child_token()).instrument(span));
    }
    debug!("stopped accepting calls");
}

/// Snapshots from `receiver`, skipping over any that were dropped because
/// the consumer fell behind.
fn snapshot_stream(receiver: broadcast::Receiver<ServiceInfo>) -> BoxStream<'static, ServiceInfo> {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(info) => return Some((info, receiver)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    trace!(skipped, "registration consumer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

/// A live service registration.
///
/// Yields a [`ServiceInfo`] snapshot every time one of the registration's
/// counters changes. The stream does not end while the registration is
/// alive. A registration that is not polled buffers at most
/// [`SNAPSHOT_BUFFER`](crate::SNAPSHOT_BUFFER) snapshots; older ones are
/// skipped. Dropping the registration unregisters the service.
pub struct Registration {
    name: Arc<str>,
    info: Arc<InfoAggregator>,
    snapshots: BoxStream<'static, ServiceInfo>,
    _guard: DropGuard,
}

impl Registration {
    /// The registered service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current counters.
    #[must_use]
    pub fn info(&self) -> ServiceInfo {
        self.info.snapshot()
    }
}

impl Stream for Registration {
    type Item = ServiceInfo;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.snapshots.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("info", &self.info())
            .finish_non_exhaustive()
    }
}
