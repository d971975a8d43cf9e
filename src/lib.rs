//! weir: a concurrent fixed-frame TCP collector.
//!
//! A bounded pool of per-connection worker threads reads fixed-size frames
//! from non-blocking sockets into a single shared [`log::MessageLog`]. The
//! [`runtime::Collector`] supervises the pool: it waits until a target
//! number of frames has arrived, cooperatively cancels the acceptor and
//! every worker, then hands the log back for an exclusive drain.

pub mod frame;
pub mod log;
pub mod net;
pub mod runtime;

mod trace;

pub use trace::init_tracing;
