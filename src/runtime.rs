//! Collection runtime.
//!
//! Three thread roles, joined in strict order on shutdown:
//! - **Supervisor** (the caller, via [`Collector`]): waits for the target
//!   frame count, then signals shutdown and reclaims the log.
//! - **Acceptor** (one thread): polls for connections up to the capacity
//!   bound, spawns a worker per connection, and on shutdown cancels and
//!   joins every worker before exiting itself.
//! - **Workers** (≤ capacity threads): per-connection read loops feeding
//!   the shared log.

pub mod collector;

pub(crate) mod acceptor;
pub(crate) mod worker;

pub use collector::{Collector, CollectorConfig, CollectorError};
