//! Testing utilities for RaaS.
//!
//! This crate provides what end-to-end tests of services and calls need:
//!
//! - [`TestNet`]: an in-memory bus handing out servers and clients
//! - [`fixtures`]: ready-made services and chunk helpers
//! - [`faulty`]: a connection wrapper that drops selected publishes
//! - [`assertions`] and [`async_helpers`] for concise test code

#![deny(missing_docs)]

pub mod assertions;
pub mod async_helpers;
pub mod faulty;
pub mod fixtures;
pub mod net;

pub use assertions::{assert_error_kind, assert_remote_error};
pub use async_helpers::{DEFAULT_TIMEOUT, assert_times_out, timed, wait_for, with_timeout};
pub use faulty::{FaultLayer, Faults, FaultyConnection};
pub use net::TestNet;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::assertions::{assert_error_kind, assert_remote_error};
    pub use crate::async_helpers::{assert_times_out, timed, wait_for, with_timeout};
    pub use crate::faulty::Faults;
    pub use crate::fixtures;
    pub use crate::net::TestNet;
}
