//! Connection-accepting loop.
//!
//! Responsibilities:
//! - Poll-accept connections while below the capacity bound; at capacity,
//!   stop calling accept so pending attempts queue in the kernel backlog
//!   (back-pressure, nothing actively refused).
//! - Spawn one worker thread per accepted connection and track its handle.
//! - Reap workers that exited on their own, freeing their slots.
//! - On shutdown (or fatal listener error): cancel every worker, join
//!   each in sequence, then close the listening socket.
//!
//! The handle set is owned by this thread alone; capacity is enforced
//! here and nowhere else.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::log::MessageLog;
use crate::net::Listener;
use crate::trace::{debug, error, info};

use super::worker::{Worker, WorkerHandle};

/// The accepting loop, run on its own thread.
///
/// Lifecycle: accepting until the run flag clears or the listener fails,
/// then draining (cancel + join every worker), then stopped (listener
/// closed by drop).
pub(crate) struct Acceptor<const N: usize> {
    listener: Listener,
    run: Arc<AtomicBool>,
    log: Arc<MessageLog<N>>,
    max_conns: usize,
    poll_interval: Duration,
    workers: Vec<WorkerHandle>,
    spawned: usize,
}

impl<const N: usize> Acceptor<N> {
    pub(crate) fn new(
        listener: Listener,
        run: Arc<AtomicBool>,
        log: Arc<MessageLog<N>>,
        max_conns: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            listener,
            run,
            log,
            max_conns,
            poll_interval,
            workers: Vec::with_capacity(max_conns),
            spawned: 0,
        }
    }

    /// Runs until the supervisor clears the run flag, then drains.
    ///
    /// A fatal listening-socket error also ends the accepting phase, but
    /// the drain still runs: workers are always cancelled and joined
    /// before this returns, whatever the cause.
    pub(crate) fn run(mut self) -> io::Result<()> {
        info!(max_conns = self.max_conns, "acceptor: accepting connections");
        let mut fatal = None;

        while self.run.load(Ordering::Relaxed) {
            self.reap_finished();

            if self.workers.len() >= self.max_conns {
                // At capacity: let pending attempts wait in the backlog.
                thread::sleep(self.poll_interval);
                continue;
            }

            match self.listener.try_accept() {
                Ok(Some((conn, peer))) => {
                    info!(peer = %peer, active = self.workers.len() + 1, "acceptor: connection accepted");
                    let handle = Worker::spawn(
                        self.spawned,
                        conn,
                        peer,
                        Arc::clone(&self.log),
                        self.poll_interval,
                    );
                    self.spawned += 1;
                    self.workers.push(handle);
                }
                Ok(None) => thread::sleep(self.poll_interval),
                Err(e) => {
                    error!(error = %e, "acceptor: listening socket failed");
                    fatal = Some(e);
                    break;
                }
            }
        }

        info!(active = self.workers.len(), "acceptor: draining workers");
        for worker in &self.workers {
            worker.cancel();
        }
        // Joining in sequence: once this loop finishes, no worker touches
        // the log or its socket again.
        for worker in self.workers.drain(..) {
            worker.join();
        }

        info!("acceptor: stopped");
        // Dropping `self.listener` closes the listening socket.
        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Joins workers whose read loop already returned, freeing slots for
    /// queued connections.
    fn reap_finished(&mut self) {
        let mut i = 0;
        while i < self.workers.len() {
            if self.workers[i].is_finished() {
                let worker = self.workers.swap_remove(i);
                debug!(active = self.workers.len(), "acceptor: reaped finished worker");
                worker.join();
            } else {
                i += 1;
            }
        }
    }
}
