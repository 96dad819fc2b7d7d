//! Fixed worker thread pool
//!
//! N threads draining a crossbeam channel of boxed jobs. Used both for the
//! work pool (business callbacks, connection teardown) and for the I/O pool
//! (each I/O thread runs one long-lived monitor-poll job).
//!
//! Every job runs under a panic guard: a panicking business handler costs one
//! job, never a pool thread.

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size worker pool with drain-then-join shutdown
pub struct WorkerPool {
    name: &'static str,
    tx: Mutex<Option<Sender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a stopped pool; call [`start`](Self::start) to spawn workers
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            tx: Mutex::new(None),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn `count` worker threads
    ///
    /// No-op if the pool is already running.
    pub fn start(&self, count: usize) {
        let mut tx_slot = self.tx.lock();
        if tx_slot.is_some() {
            return;
        }
        let (tx, rx) = unbounded::<Job>();
        let mut handles = self.handles.lock();
        for i in 0..count {
            let rx = rx.clone();
            let name = self.name;
            let handle = std::thread::Builder::new()
                .name(format!("{name}-{i}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            tracing::warn!("panic in {} pool job suppressed", name);
                        }
                    }
                })
                .expect("failed to spawn pool thread");
            handles.push(handle);
        }
        *tx_slot = Some(tx);
    }

    /// Submit a job
    ///
    /// Jobs submitted after [`stop`](Self::stop) are silently dropped; the
    /// engine treats that as a shutdown race, not an error.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(Box::new(job));
        }
    }

    /// Whether the pool currently has workers
    pub fn is_running(&self) -> bool {
        self.tx.lock().is_some()
    }

    /// Stop the pool: close the queue, drain outstanding jobs, join workers
    ///
    /// Safe to call multiple times.
    pub fn stop(&self) {
        // Dropping the sender lets each worker finish queued jobs and exit.
        let tx = self.tx.lock().take();
        drop(tx);
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}
