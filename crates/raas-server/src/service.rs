//! Service handlers.
//!
//! A service turns the input stream of one call into its output stream.
//! Any `Fn(InputStream) -> impl Stream` closure is a [`Service`]; wrap a
//! closure in [`with_context`] when the handler also needs to know which
//! call it is serving.
//!
//! # Example
//!
//! ```rust
//! use futures::StreamExt;
//! use raas_server::{InputStream, OutputStream, Service, CallContext};
//! use raas_core::Port;
//!
//! // Echo: every input chunk comes back unchanged.
//! let echo = |input: InputStream| input;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let ctx = CallContext::new("echo", Port::generate(), Port::generate());
//! let output: OutputStream = echo.on_call(ctx, InputStream::from_chunks([&b"hi"[..]]));
//! let chunks: Vec<_> = output.collect().await;
//! assert_eq!(chunks.len(), 1);
//! # }
//! ```

use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use futures::stream::{BoxStream, StreamExt};
use raas_core::error::RaasError;
use raas_core::port::Port;
use raas_transport::InputStream;

/// The output a handler produces for one call.
pub type OutputStream = BoxStream<'static, Result<Bytes, RaasError>>;

/// Identity of the call a handler is serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    service: Arc<str>,
    client_port: Port,
    service_port: Port,
}

impl CallContext {
    /// Create a call context.
    pub fn new(service: impl Into<Arc<str>>, client_port: Port, service_port: Port) -> Self {
        Self {
            service: service.into(),
            client_port,
            service_port,
        }
    }

    /// The service name the call was addressed to.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The port the handler's output is published to.
    #[must_use]
    pub const fn client_port(&self) -> &Port {
        &self.client_port
    }

    /// The port the handler's input arrives on.
    #[must_use]
    pub const fn service_port(&self) -> &Port {
        &self.service_port
    }
}

/// A handler for calls to a registered service.
///
/// The returned stream is published to the caller chunk by chunk; ending
/// it completes the call and yielding an error fails it with that error's
/// message. Errors never escape the call they belong to.
pub trait Service: Send + Sync + 'static {
    /// Start serving one call.
    fn on_call(&self, ctx: CallContext, input: InputStream) -> OutputStream;
}

impl<F, S> Service for F
where
    F: Fn(InputStream) -> S + Send + Sync + 'static,
    S: Stream<Item = Result<Bytes, RaasError>> + Send + 'static,
{
    fn on_call(&self, _ctx: CallContext, input: InputStream) -> OutputStream {
        self(input).boxed()
    }
}

/// A service built from a closure that also receives the [`CallContext`].
#[derive(Debug, Clone)]
pub struct WithContext<F> {
    handler: F,
}

/// Build a service from a closure taking the call context and the input.
pub const fn with_context<F, S>(handler: F) -> WithContext<F>
where
    F: Fn(CallContext, InputStream) -> S + Send + Sync + 'static,
    S: Stream<Item = Result<Bytes, RaasError>> + Send + 'static,
{
    WithContext { handler }
}

impl<F, S> Service for WithContext<F>
where
    F: Fn(CallContext, InputStream) -> S + Send + Sync + 'static,
    S: Stream<Item = Result<Bytes, RaasError>> + Send + 'static,
{
    fn on_call(&self, ctx: CallContext, input: InputStream) -> OutputStream {
        (self.handler)(ctx, input).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use pretty_assertions::assert_eq;

    fn ctx() -> CallContext {
        CallContext::new("upper", Port::generate(), Port::generate())
    }

    #[tokio::test]
    async fn test_closure_service() {
        let upper = |input: InputStream| {
            input.map(|chunk| chunk.map(|b| Bytes::from(b.to_ascii_uppercase())))
        };

        let output: Vec<_> = upper
            .on_call(ctx(), InputStream::from_chunks([&b"ab"[..], &b"c"[..]]))
            .collect()
            .await;
        let output: Vec<Bytes> = output.into_iter().map(Result::unwrap).collect();
        assert_eq!(output, vec![Bytes::from_static(b"AB"), Bytes::from_static(b"C")]);
    }

    #[tokio::test]
    async fn test_context_service() {
        let named = with_context(|ctx: CallContext, _input: InputStream| {
            stream::once(async move { Ok(Bytes::from(ctx.service().to_string())) })
        });

        let output: Vec<_> = named.on_call(ctx(), InputStream::empty()).collect().await;
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].as_ref().unwrap(), &Bytes::from_static(b"upper"));
    }

    #[tokio::test]
    async fn test_failing_service() {
        let failing = |_input: InputStream| stream::iter([Err::<Bytes, _>(RaasError::service("nope"))]);

        let mut output = failing.on_call(ctx(), InputStream::empty());
        let err = output.next().await.unwrap().unwrap_err();
        assert_eq!(err.final_message(), "nope");
    }
}
