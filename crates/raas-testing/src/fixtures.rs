//! Ready-made services and stream helpers.
//!
//! ```rust
//! use futures::StreamExt;
//! use raas_server::{CallContext, Service};
//! use raas_testing::fixtures;
//! use raas_core::Port;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let ctx = CallContext::new("echo", Port::generate(), Port::generate());
//! let output = fixtures::echo().on_call(ctx, fixtures::input(["a", "b"]));
//! let chunks = fixtures::collect(output).await.unwrap();
//! assert_eq!(chunks, fixtures::chunks(["a", "b"]));
//! # }
//! ```

use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use raas_core::error::RaasError;
use raas_server::{InputStream, Service};

/// A service that sends every input chunk back unchanged.
#[must_use]
pub fn echo() -> impl Service {
    |input: InputStream| input
}

/// A service that upper-cases ASCII input.
#[must_use]
pub fn uppercase() -> impl Service {
    |input: InputStream| input.map(|chunk| chunk.map(|b| Bytes::from(b.to_ascii_uppercase())))
}

/// A service that ignores its input and fails with `message`.
#[must_use]
pub fn failing(message: &'static str) -> impl Service {
    move |_input: InputStream| stream::iter([Err::<Bytes, _>(RaasError::service(message))])
}

/// A service that ignores its input and sends `items`, pausing `delay`
/// before each one, then completes.
#[must_use]
pub fn ticker(items: Vec<&'static str>, delay: Duration) -> impl Service {
    move |_input: InputStream| {
        stream::iter(items.clone()).then(move |item| async move {
            tokio::time::sleep(delay).await;
            Ok::<_, RaasError>(Bytes::from_static(item.as_bytes()))
        })
    }
}

/// A service that never sends anything and never completes.
#[must_use]
pub fn silent() -> impl Service {
    |_input: InputStream| stream::pending::<Result<Bytes, RaasError>>()
}

/// A service that drains its input and replies with how many chunks it saw.
///
/// An input error fails the call with that error.
#[must_use]
pub fn counter() -> impl Service {
    |input: InputStream| {
        stream::once(async move {
            let mut seen: u64 = 0;
            let mut input = input;
            while let Some(chunk) = input.next().await {
                chunk?;
                seen += 1;
            }
            Ok::<_, RaasError>(Bytes::from(seen.to_string()))
        })
    }
}

/// Chunks as [`Bytes`].
pub fn chunks<I, S>(items: I) -> Vec<Bytes>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| Bytes::copy_from_slice(s.as_ref().as_bytes()))
        .collect()
}

/// A completed input stream made of the given chunks.
pub fn input<I, S>(items: I) -> InputStream
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    InputStream::from_chunks(chunks(items))
}

/// Call input that sends the given chunks and then completes.
pub fn call_input<I, S>(items: I) -> impl Stream<Item = Result<Bytes, RaasError>> + Send + 'static
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    stream::iter(chunks(items).into_iter().map(Ok))
}

/// Call input that never sends anything and never completes.
#[must_use]
pub fn endless_input() -> impl Stream<Item = Result<Bytes, RaasError>> + Send + 'static {
    stream::pending()
}

/// Collect a chunk stream, stopping at the first error.
///
/// # Errors
///
/// Returns the first error the stream yields.
pub async fn collect<S>(stream: S) -> Result<Vec<Bytes>, RaasError>
where
    S: Stream<Item = Result<Bytes, RaasError>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.push(chunk?);
    }
    Ok(out)
}
