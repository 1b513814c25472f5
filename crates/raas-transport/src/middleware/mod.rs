//! Composable middleware for connections.
//!
//! Layers wrap a [`Connection`] to add behavior without the protocol code
//! knowing about it.
//!
//! # Example
//!
//! ```rust
//! use raas_transport::middleware::{IdentityLayer, LayerStack, LoggingLayer};
//! use raas_transport::{Connection, MemoryBus};
//!
//! let bus = MemoryBus::new();
//!
//! let conn = LayerStack::new(bus.connect())
//!     .with(IdentityLayer)
//!     .with(LoggingLayer::default())
//!     .into_inner();
//! assert!(conn.is_connected());
//! ```

mod logging;

pub use logging::{LoggedSubscription, LoggingConnection, LoggingLayer};

use crate::traits::Connection;

/// A layer that wraps a connection to add functionality.
pub trait ConnectionLayer<C: Connection> {
    /// The connection type produced by this layer.
    type Connection: Connection;

    /// Wrap the inner connection with this layer's functionality.
    fn layer(&self, inner: C) -> Self::Connection;
}

/// A stack of layers applied to a connection.
///
/// Layers are applied from left to right (first added, innermost).
pub struct LayerStack<C> {
    inner: C,
}

impl<C: Connection> LayerStack<C> {
    /// Create a new layer stack around a connection.
    pub fn new(connection: C) -> Self {
        Self { inner: connection }
    }

    /// Apply a layer to the stack.
    pub fn with<L>(self, layer: L) -> LayerStack<L::Connection>
    where
        L: ConnectionLayer<C>,
    {
        LayerStack {
            inner: layer.layer(self.inner),
        }
    }

    /// Get the wrapped connection.
    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Get a reference to the wrapped connection.
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

/// Layer that passes the connection through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityLayer;

impl<C: Connection> ConnectionLayer<C> for IdentityLayer {
    type Connection = C;

    fn layer(&self, inner: C) -> Self::Connection {
        inner
    }
}
