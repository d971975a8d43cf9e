//! Supervisor for the collection runtime.
//!
//! [`Collector::spawn`] binds the listener (so bind errors surface
//! synchronously), creates the shared log and run flag, and starts the
//! acceptor thread. The caller then drives the phases:
//!
//! 1. [`Collector::wait_for_target`]: poll the frame count until the
//!    target is reached (or the configured deadline passes).
//! 2. [`Collector::shutdown`]: clear the acceptor's run flag and join
//!    it; the acceptor transitively cancels and joins every worker, so
//!    when the join returns no writer remains.
//! 3. Drain the returned [`MessageLog`] and compare the drained count
//!    against the last snapshot.
//!
//! The ownership chain makes step 3 safe by construction: the log comes
//! back from [`Collector::shutdown`] only after `Arc::try_unwrap`
//! succeeds, which requires every worker's handle to be gone.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use minstant::Instant;

use crate::frame::DEFAULT_FRAME_CAP;
use crate::log::MessageLog;
use crate::net::{DEFAULT_BACKLOG, Endpoint, Listener};
use crate::trace::{debug, info};

use super::acceptor::Acceptor;

/// Configuration for a collection run.
pub struct CollectorConfig {
    /// Endpoint to listen on. Port 0 requests an ephemeral port.
    pub bind_addr: Endpoint,
    /// Kernel accept backlog; connections beyond capacity queue here.
    pub backlog: i32,
    /// Maximum number of simultaneous connections (worker threads).
    pub max_conns: usize,
    /// Total frame count to collect before shutting down.
    pub target_frames: u64,
    /// Sleep between readiness/cancellation polls.
    pub poll_interval: Duration,
    /// Give up waiting for the target after this long.
    ///
    /// `None` waits forever; that is the library default, and the
    /// server binary sets a deadline instead.
    pub wait_timeout: Option<Duration>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            bind_addr: Endpoint::any(8001),
            backlog: DEFAULT_BACKLOG,
            max_conns: 4,
            target_frames: 20,
            poll_interval: Duration::from_millis(1),
            wait_timeout: None,
        }
    }
}

/// Error running a collection.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// The listening socket could not be created or bound.
    #[error("failed to bind listener: {0}")]
    Bind(io::Error),
    /// The wait deadline passed before the target count was reached.
    #[error("received {received} of {target} frames before the deadline")]
    TimedOut { received: u64, target: u64 },
    /// The listening socket failed while accepting.
    #[error("listening socket failed: {0}")]
    Acceptor(io::Error),
    /// The acceptor thread panicked.
    #[error("acceptor thread panicked")]
    AcceptorPanicked,
    /// A log handle outlived the join of every worker.
    #[error("message log still shared after all workers were joined")]
    LogStillShared,
    /// The drain visited a different number of frames than the log
    /// counted.
    #[error("drained {drained} frames but the log counted {observed}")]
    CountMismatch { drained: u64, observed: u64 },
}

/// Handle to a running collection.
///
/// Dropping the handle signals shutdown but does not wait; use
/// [`Collector::shutdown`] for the graceful join-then-drain path.
pub struct Collector<const N: usize = DEFAULT_FRAME_CAP> {
    log: Option<Arc<MessageLog<N>>>,
    run: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<io::Result<()>>>,
    local_addr: Endpoint,
    target: u64,
    poll_interval: Duration,
    wait_timeout: Option<Duration>,
}

impl<const N: usize> Collector<N> {
    /// Binds the listener and spawns the acceptor thread.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Bind`] if the listener cannot be set up.
    ///
    /// # Panics
    ///
    /// Panics if thread spawning fails.
    pub fn spawn(config: CollectorConfig) -> Result<Self, CollectorError> {
        let listener =
            Listener::bind(config.bind_addr, config.backlog).map_err(CollectorError::Bind)?;
        let local_addr = listener.local_addr().map_err(CollectorError::Bind)?;
        info!(
            addr = %local_addr,
            max_conns = config.max_conns,
            target = config.target_frames,
            "collector starting"
        );

        let log = Arc::new(MessageLog::new());
        let run = Arc::new(AtomicBool::new(true));

        let acceptor = Acceptor::new(
            listener,
            Arc::clone(&run),
            Arc::clone(&log),
            config.max_conns,
            config.poll_interval,
        );
        let handle = thread::Builder::new()
            .name("weir-acceptor".into())
            .spawn(move || acceptor.run())
            .expect("failed to spawn acceptor thread");

        Ok(Self {
            log: Some(log),
            run,
            acceptor: Some(handle),
            local_addr,
            target: config.target_frames,
            poll_interval: config.poll_interval,
            wait_timeout: config.wait_timeout,
        })
    }

    /// The endpoint the listener is actually bound to.
    #[must_use]
    pub fn local_addr(&self) -> Endpoint {
        self.local_addr
    }

    /// The configured target frame count.
    #[must_use]
    pub fn target(&self) -> u64 {
        self.target
    }

    /// Current frame count, as one consistent read.
    #[must_use]
    pub fn snapshot_count(&self) -> u64 {
        self.shared_log().snapshot_count()
    }

    /// Polls the frame count until it reaches the target.
    ///
    /// Returns the observed count (≥ target) on success. With a
    /// configured `wait_timeout`, gives up once the deadline passes and
    /// reports how far the collection got; without one, waits forever.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::TimedOut`] if the deadline passes first.
    pub fn wait_for_target(&self) -> Result<u64, CollectorError> {
        let deadline = self.wait_timeout.map(|t| Instant::now() + t);
        loop {
            let received = self.shared_log().snapshot_count();
            if received >= self.target {
                debug!(received, "collector: target reached");
                return Ok(received);
            }
            if let Some(deadline) = deadline
                && Instant::now() > deadline
            {
                return Err(CollectorError::TimedOut {
                    received,
                    target: self.target,
                });
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Shuts the runtime down and reclaims the log.
    ///
    /// Clears the acceptor's run flag and joins it; the acceptor cancels
    /// and joins every worker before exiting, so once this returns no
    /// thread holds a log handle or an open connection. The returned log
    /// is exclusively owned and ready to drain.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Acceptor`] if the listening socket had
    /// failed (workers were still drained first),
    /// [`CollectorError::AcceptorPanicked`] if the join failed, or
    /// [`CollectorError::LogStillShared`] if exclusive ownership could
    /// not be reclaimed.
    pub fn shutdown(mut self) -> Result<MessageLog<N>, CollectorError> {
        info!("collector: shutdown initiated");
        self.run.store(false, Ordering::Relaxed);

        let handle = self
            .acceptor
            .take()
            .expect("acceptor handle taken only by shutdown");
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(CollectorError::Acceptor(e)),
            Err(_) => return Err(CollectorError::AcceptorPanicked),
        }

        let log = self.log.take().expect("log taken only by shutdown");
        let log = Arc::try_unwrap(log).map_err(|_| CollectorError::LogStillShared)?;
        info!(received = log.snapshot_count(), "collector: shutdown complete");
        Ok(log)
    }

    fn shared_log(&self) -> &Arc<MessageLog<N>> {
        self.log.as_ref().expect("log present until shutdown")
    }
}

impl<const N: usize> Drop for Collector<N> {
    fn drop(&mut self) {
        // Signal shutdown if it was not requested explicitly; the
        // acceptor and its workers exit on their own within a few poll
        // intervals. shutdown() is the path that also joins.
        self.run.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(target: u64, wait_timeout: Option<Duration>) -> CollectorConfig {
        CollectorConfig {
            bind_addr: Endpoint::localhost(0),
            target_frames: target,
            wait_timeout,
            ..CollectorConfig::default()
        }
    }

    #[test]
    fn spawn_then_shutdown_with_no_clients() {
        let collector = Collector::<64>::spawn(config(10, None)).unwrap();
        assert_ne!(collector.local_addr().port(), 0);
        assert_eq!(collector.snapshot_count(), 0);

        let log = collector.shutdown().unwrap();
        assert_eq!(log.snapshot_count(), 0);
        assert_eq!(log.drain().count(), 0);
    }

    #[test]
    fn wait_times_out_with_no_traffic() {
        let collector =
            Collector::<64>::spawn(config(10, Some(Duration::from_millis(50)))).unwrap();

        match collector.wait_for_target() {
            Err(CollectorError::TimedOut { received, target }) => {
                assert_eq!(received, 0);
                assert_eq!(target, 10);
            }
            other => panic!("expected TimedOut, got {other:?}"),
        }
        collector.shutdown().unwrap();
    }

    #[test]
    fn zero_target_is_immediately_reached() {
        let collector = Collector::<64>::spawn(config(0, None)).unwrap();
        assert_eq!(collector.wait_for_target().unwrap(), 0);
        collector.shutdown().unwrap();
    }

    #[test]
    fn bind_error_surfaces_synchronously() {
        let first = Collector::<64>::spawn(config(1, None)).unwrap();
        let taken = CollectorConfig {
            bind_addr: first.local_addr(),
            ..config(1, None)
        };
        match Collector::<64>::spawn(taken) {
            Err(CollectorError::Bind(_)) => {}
            Err(other) => panic!("expected Bind error, got {other}"),
            Ok(_) => panic!("expected Bind error, got a collector"),
        }
        first.shutdown().unwrap();
    }
}
