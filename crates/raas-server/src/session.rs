//! The server side of one call.
//!
//! A session starts from a handshake message and moves through three
//! states: the handshake is validated and answered, the call runs with
//! its input adapter, handler, output publisher and keepalive wired
//! together, and finally everything is torn down and the outcome is
//! counted.

use std::sync::Arc;

use raas_core::config::ProtocolConfig;
use raas_core::port::Port;
use raas_transport::{
    Connection, InputAdapter, Keepalive, Msg, OutputOutcome, OutputPublisher,
};
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, warn};

use crate::info::InfoAggregator;
use crate::service::{CallContext, Service};

/// State shared by every session of one registration.
pub(crate) struct SessionEnv<C, S> {
    pub(crate) conn: Arc<C>,
    pub(crate) service: S,
    pub(crate) name: Arc<str>,
    pub(crate) config: ProtocolConfig,
    pub(crate) info: Arc<InfoAggregator>,
}

/// Serve one handshake to completion.
///
/// Expects to run inside a span with empty `client_port` and
/// `service_port` fields, which are filled in once known.
pub(crate) async fn serve<C, S>(env: Arc<SessionEnv<C, S>>, handshake: Msg, token: CancellationToken)
where
    C: Connection,
    S: Service,
{
    let Some(reply_to) = handshake.reply_to else {
        warn!("dropping handshake without a reply subject");
        return;
    };
    let client_port = match Port::from_bytes(&handshake.body) {
        Ok(port) => port,
        Err(e) => {
            warn!(error = %e, "dropping handshake");
            return;
        }
    };
    let service_port = Port::generate();

    let span = Span::current();
    span.record("client_port", client_port.as_str());
    span.record("service_port", service_port.as_str());

    // Subscribe before replying so the first input frame cannot be missed.
    let subscription = match env.conn.subscribe(service_port.as_str()).await {
        Ok(sub) => sub,
        Err(e) => {
            warn!(error = %e, "failed to open service port");
            return;
        }
    };
    if let Err(e) = env.conn.publish(&reply_to, service_port.to_bytes()).await {
        warn!(error = %e, "failed to answer handshake");
        return;
    }
    env.info.record_called();
    debug!("call accepted");

    let mut adapter = InputAdapter::new(
        Arc::clone(&env.conn),
        service_port.clone(),
        client_port.clone(),
        subscription,
        env.config.input_timeout,
    )
    .dispose_completes(true);
    let pongs = adapter.with_pong_signal();
    let input = adapter.spawn(token.clone());

    let ctx = CallContext::new(Arc::clone(&env.name), client_port.clone(), service_port);
    let output = env.service.on_call(ctx, input);

    let keepalive = Keepalive::new(Arc::clone(&env.conn), client_port.clone(), &env.config, pongs);
    let publisher = OutputPublisher::new(Arc::clone(&env.conn), client_port);
    let outcome = publisher
        .pump_until(output, token.clone(), keepalive.run())
        .await;

    // Stops the input adapter, releasing the service port.
    token.cancel();

    match outcome {
        OutputOutcome::Completed => {
            env.info.record_completed();
            debug!("call completed");
        }
        OutputOutcome::Failed(e) => {
            env.info.record_error();
            warn!(error = %e, "call failed");
        }
        OutputOutcome::Cancelled => debug!("call cancelled"),
    }
}
