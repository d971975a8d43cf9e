//! Per-connection worker.
//!
//! Responsibilities:
//! - Poll-read fixed-size frames from one non-blocking connection.
//! - Append each frame to the shared log (copy first, lock briefly).
//! - Exit on peer close, fatal I/O error, or cooperative cancellation.
//! - Close the owned connection exactly once, on every exit path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::frame::Frame;
use crate::log::MessageLog;
use crate::net::{Conn, Endpoint};
use crate::trace::{debug, warn};

/// Handle the acceptor keeps for each spawned worker.
pub(crate) struct WorkerHandle {
    run: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    // Read only by trace output.
    #[allow(dead_code)]
    peer: Endpoint,
}

impl WorkerHandle {
    /// Asks the worker to stop after its current loop iteration.
    ///
    /// Cooperative and best-effort: bytes the peer sent but the worker
    /// has not yet read are not drained.
    pub(crate) fn cancel(&self) {
        self.run.store(false, Ordering::Relaxed);
    }

    /// Whether the worker thread has already returned.
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Joins the worker thread. A worker panic is contained here.
    pub(crate) fn join(self) {
        if self.handle.join().is_err() {
            warn!(peer = %self.peer, "worker thread panicked");
        }
    }
}

/// One connection's read loop, run on its own thread.
pub(crate) struct Worker<const N: usize> {
    conn: Conn,
    // Read only by trace output.
    #[allow(dead_code)]
    peer: Endpoint,
    run: Arc<AtomicBool>,
    log: Arc<MessageLog<N>>,
    poll_interval: Duration,
}

impl<const N: usize> Worker<N> {
    /// Spawns a worker thread for an accepted connection.
    ///
    /// # Panics
    ///
    /// Panics if thread spawning fails.
    pub(crate) fn spawn(
        id: usize,
        conn: Conn,
        peer: Endpoint,
        log: Arc<MessageLog<N>>,
        poll_interval: Duration,
    ) -> WorkerHandle {
        let run = Arc::new(AtomicBool::new(true));
        let thread_run = Arc::clone(&run);
        let handle = thread::Builder::new()
            .name(format!("weir-worker-{id}"))
            .spawn(move || {
                let worker = Worker {
                    conn,
                    peer,
                    run: thread_run,
                    log,
                    poll_interval,
                };
                worker.run();
            })
            .expect("failed to spawn worker thread");

        WorkerHandle { run, handle, peer }
    }

    /// Runs the read loop until peer close, fatal error, or cancellation.
    fn run(mut self) {
        debug!(peer = %self.peer, "worker: started");
        let mut buf = [0u8; N];

        while self.run.load(Ordering::Relaxed) {
            match self.conn.try_read(&mut buf) {
                Ok(Some(0)) => {
                    debug!(peer = %self.peer, "worker: peer closed");
                    break;
                }
                Ok(Some(n)) => {
                    // One read is one frame, short or not; the copy is
                    // taken outside the lock.
                    self.log.append(Frame::copy_from(&buf[..n]));
                }
                Ok(None) => {
                    // Nothing readable yet; re-check the run flag after a
                    // short sleep rather than spinning hot.
                    thread::sleep(self.poll_interval);
                }
                Err(e) => {
                    warn!(peer = %self.peer, error = %e, "worker: read failed");
                    break;
                }
            }
        }

        debug!(peer = %self.peer, "worker: exiting");
        // `self.conn` drops here: the one and only close of this
        // connection, reached from every exit path above.
    }
}
