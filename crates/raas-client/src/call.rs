//! The caller's view of one call.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use raas_core::error::RaasError;
use raas_core::port::Port;
use raas_transport::InputStream;
use tokio_util::sync::DropGuard;

/// The output of a remote call.
///
/// Yields each chunk the service sends, in order. The stream ends with
/// `None` when the service completes, or yields one error and then ends.
///
/// Dropping the stream abandons the call: the input still being sent is
/// terminated with a dispose frame and both ports are released.
pub struct CallStream {
    output: InputStream,
    client_port: Port,
    service_port: Port,
    _guard: DropGuard,
}

impl CallStream {
    pub(crate) fn new(output: InputStream, client_port: Port, service_port: Port, guard: DropGuard) -> Self {
        Self {
            output,
            client_port,
            service_port,
            _guard: guard,
        }
    }

    /// The port this call receives output on.
    #[must_use]
    pub const fn client_port(&self) -> &Port {
        &self.client_port
    }

    /// The port this call sends input to.
    #[must_use]
    pub const fn service_port(&self) -> &Port {
        &self.service_port
    }
}

impl Stream for CallStream {
    type Item = Result<Bytes, RaasError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.output).poll_next(cx)
    }
}

impl std::fmt::Debug for CallStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallStream")
            .field("client_port", &self.client_port)
            .field("service_port", &self.service_port)
            .finish_non_exhaustive()
    }
}
