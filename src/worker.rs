//! Cancellable background worker loop.
//!
//! A worker owns one thread that repeats a caller-supplied iteration until a
//! stop request is observed. Cancellation is cooperative and checked once
//! per full iteration, at the top of the loop, so shutdown latency is
//! bounded below by one iteration period (iteration body plus the idle
//! sleep). Callers wait on [`WorkerHandle::request_stop`] instead of
//! assuming the stop takes effect immediately.
//!
//! An iteration that fails is reported and swallowed; the loop keeps
//! running. Only a stop request ends the worker.

use crate::error::{Result, VdevError};
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Lifecycle states of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Running,
    StopRequested,
    Stopped,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Created => write!(f, "Created"),
            WorkerState::Running => write!(f, "Running"),
            WorkerState::StopRequested => write!(f, "StopRequested"),
            WorkerState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Handle to a spawned worker thread.
///
/// Owned by whoever started the worker; only the owner starts and stops it.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    stop: Arc<AtomicBool>,
    state: Arc<Mutex<WorkerState>>,
    exit_code: i32,
    thread: Option<JoinHandle<i32>>,
}

impl WorkerHandle {
    /// Spawn a worker named `name`.
    ///
    /// The thread repeats until the stop flag is observed: run `iteration`,
    /// then sleep `idle`. `idle` must be nonzero; a zero interval would busy
    /// spin. `exit_code` is the status the thread reports when it exits.
    pub fn spawn<F>(name: &str, idle: Duration, exit_code: i32, mut iteration: F) -> Result<Self>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        if name.is_empty() {
            return Err(VdevError::invalid_input("worker needs a name"));
        }
        if idle.is_zero() {
            return Err(VdevError::invalid_input(
                "worker idle interval must be nonzero",
            ));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let state = Arc::new(Mutex::new(WorkerState::Created));

        let thread = {
            let stop = stop.clone();
            let state = state.clone();
            let thread_name = name.to_string();
            std::thread::Builder::new()
                .name(name.to_string())
                .spawn(move || {
                    // Stop is examined only here, once per full iteration.
                    while !stop.load(Ordering::Acquire) {
                        if let Err(e) = iteration() {
                            warn!("worker '{}': iteration failed: {}", thread_name, e);
                        }
                        std::thread::sleep(idle);
                    }
                    *state.lock() = WorkerState::Stopped;
                    exit_code
                })
                .map_err(|e| VdevError::worker(format!("spawn '{}': {}", name, e)))?
        };

        *state.lock() = WorkerState::Running;
        info!("worker '{}' started", name);

        Ok(Self {
            name: name.to_string(),
            stop,
            state,
            exit_code,
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Whether the thread is still executing iterations. False once a stop
    /// completes.
    pub fn is_running(&self) -> bool {
        matches!(
            self.state(),
            WorkerState::Running | WorkerState::StopRequested
        ) && self.thread.is_some()
    }

    /// Request a cooperative stop and wait for the thread to exit.
    ///
    /// Blocks for at most roughly one iteration period, then returns the
    /// worker's final status code.
    pub fn request_stop(mut self) -> Result<i32> {
        self.stop.store(true, Ordering::Release);
        *self.state.lock() = WorkerState::StopRequested;

        let thread = self
            .thread
            .take()
            .ok_or_else(|| VdevError::worker(format!("'{}' already joined", self.name)))?;
        let code = thread
            .join()
            .map_err(|_| VdevError::worker(format!("'{}' panicked", self.name)))?;

        *self.state.lock() = WorkerState::Stopped;
        info!("worker '{}' stopped with code {}", self.name, code);
        Ok(code)
    }

    /// Status code this worker reports on stop.
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // A dropped handle still stops its thread; the join is bounded by
        // one iteration period.
        if let Some(thread) = self.thread.take() {
            self.stop.store(true, Ordering::Release);
            let _ = thread.join();
            *self.state.lock() = WorkerState::Stopped;
        }
    }
}
