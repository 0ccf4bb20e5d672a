//! # Worker pool seam.
//!
//! The background and async dispatchers never spawn threads themselves; they
//! submit tasks to an [`Executor`] supplied by the host. The default is
//! [`CachedThreadPool`]: workers are spawned on demand, idle workers hang
//! around for a while to absorb bursts, and an idle worker that sees no work
//! within the keep-alive window exits.
//!
//! ## Rules
//! - `execute` never blocks and never drops a task.
//! - No ordering guarantee between tasks; serialization is the caller's job.
//! - A panicking task is contained and logged; the worker survives.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::logger::{LogLevel, Logger, TracingLogger};

/// A unit of work submitted to the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Parallel task execution contract consumed by the dispatchers.
pub trait Executor: Send + Sync + 'static {
    /// Submits a task for execution on some worker thread.
    fn execute(&self, job: Job);
}

const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Spawn-on-demand thread pool with idle-worker reuse.
pub struct CachedThreadPool {
    state: Arc<PoolState>,
}

struct PoolState {
    queue: Mutex<PoolQueue>,
    available: Condvar,
    logger: Arc<dyn Logger>,
}

#[derive(Default)]
struct PoolQueue {
    jobs: std::collections::VecDeque<Job>,
    idle: usize,
}

impl CachedThreadPool {
    pub fn new() -> Self {
        Self {
            state: Arc::new(PoolState {
                queue: Mutex::new(PoolQueue::default()),
                available: Condvar::new(),
                logger: Arc::new(TracingLogger),
            }),
        }
    }

    fn spawn_worker(&self) {
        let state = Arc::clone(&self.state);
        let spawned = thread::Builder::new()
            .name("postbus-worker".into())
            .spawn(move || worker_loop(state));
        if let Err(error) = spawned {
            self.state.logger.log(
                LogLevel::Severe,
                &format!("failed to spawn worker thread: {error}"),
            );
        }
    }
}

impl Default for CachedThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for CachedThreadPool {
    fn execute(&self, job: Job) {
        let needs_worker = {
            let mut queue = self.state.queue.lock();
            queue.jobs.push_back(job);
            if queue.idle > 0 {
                self.state.available.notify_one();
                false
            } else {
                true
            }
        };
        if needs_worker {
            self.spawn_worker();
        }
    }
}

fn worker_loop(state: Arc<PoolState>) {
    loop {
        let job = {
            let mut queue = state.queue.lock();
            loop {
                if let Some(job) = queue.jobs.pop_front() {
                    break Some(job);
                }
                queue.idle += 1;
                let timed_out = state
                    .available
                    .wait_for(&mut queue, KEEP_ALIVE)
                    .timed_out();
                queue.idle -= 1;
                if timed_out && queue.jobs.is_empty() {
                    break None;
                }
            }
        };
        match job {
            Some(job) => {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    state
                        .logger
                        .log(LogLevel::Severe, "worker task panicked; worker continues");
                }
            }
            None => return,
        }
    }
}
