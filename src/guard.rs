//! Wall-clock containment for individual matcher invocations.
//!
//! A pathological rule must not stall message routing. The guard runs a
//! matcher closure on one of its own worker threads and waits for the result
//! up to a fixed budget; on expiry the caller treats the invocation as a
//! non-match and moves on while the worker finishes in the background and its
//! late result is discarded. Only regex matchers are routed through here, the
//! other rule types are constant-time field comparisons.
//!
//! Worker lifetime is tied to the guard: dropping it closes the job channel
//! and joins the threads.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::warn;

type Job = Box<dyn FnOnce() + Send>;

/// Bounded-latency executor for matcher invocations.
///
/// A timed-out job keeps its worker busy until the underlying evaluation
/// returns, which can delay queued evaluations behind it. The `regex` crate
/// guarantees linear-time matching, so a worker is never wedged for good and
/// the pool drains on its own.
pub(crate) struct TimeoutGuard {
    jobs: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    budget: Duration,
}

impl TimeoutGuard {
    /// Spawn `workers` named worker threads sharing one job queue.
    pub(crate) fn new(budget: Duration, workers: usize) -> Self {
        let (jobs, queue) = mpsc::channel::<Job>();
        let queue = Arc::new(Mutex::new(queue));

        let workers = (0..workers.max(1))
            .map(|n| {
                let queue = Arc::clone(&queue);
                thread::Builder::new()
                    .name(format!("stream-router-guard-{n}"))
                    .spawn(move || worker_loop(&queue))
                    .expect("failed to spawn guard worker")
            })
            .collect();

        Self {
            jobs: Some(jobs),
            workers,
            budget,
        }
    }

    pub(crate) fn budget(&self) -> Duration {
        self.budget
    }

    /// Run an evaluation under the budget.
    ///
    /// Returns `Some(result)` when the evaluation finished in time and `None`
    /// on expiry (or if the pool is gone, which only happens mid-teardown).
    pub(crate) fn evaluate<F>(&self, job: F) -> Option<bool>
    where
        F: FnOnce() -> bool + Send + 'static,
    {
        let (result_tx, result_rx) = mpsc::channel();
        let job: Job = Box::new(move || {
            // The receiver is gone if we already timed out; that late result
            // is intentionally dropped.
            let _ = result_tx.send(job());
        });

        match &self.jobs {
            Some(jobs) => {
                if jobs.send(job).is_err() {
                    return None;
                }
            }
            None => return None,
        }

        match result_rx.recv_timeout(self.budget) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        // Closing the channel ends the worker loops.
        drop(self.jobs.take());
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.join() {
                warn!("timeout guard worker panicked: {e:?}");
            }
        }
    }
}

fn worker_loop(queue: &Mutex<Receiver<Job>>) {
    loop {
        let job = match queue.lock() {
            Ok(receiver) => receiver.recv(),
            Err(_) => return,
        };
        match job {
            Ok(job) => job(),
            Err(_) => return,
        }
    }
}
