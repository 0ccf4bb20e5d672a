//! # Serial background delivery.
//!
//! One logical worker drains the queue in enqueue order on a pool-supplied
//! thread. The `running` flag guarantees at most one drainer at a time; the
//! drainer lingers on an idle timed poll before giving the thread back.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::bus::{BusInner, Subscription};
use crate::dispatch::executor::Executor;
use crate::dispatch::pending::{self, PendingPostQueue};
use crate::events::PostedEvent;

const IDLE_POLL: Duration = Duration::from_millis(1000);

pub(crate) struct BackgroundDispatcher {
    self_ref: Weak<BackgroundDispatcher>,
    queue: PendingPostQueue,
    running: Mutex<bool>,
    executor: Arc<dyn Executor>,
    bus: Weak<BusInner>,
}

impl BackgroundDispatcher {
    pub(crate) fn new(executor: Arc<dyn Executor>, bus: Weak<BusInner>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            self_ref: weak.clone(),
            queue: PendingPostQueue::new(),
            running: Mutex::new(false),
            executor,
            bus,
        })
    }

    pub(crate) fn enqueue(&self, subscription: Arc<Subscription>, event: PostedEvent) {
        let post = pending::obtain(subscription, event);
        let mut running = self.running.lock();
        self.queue.enqueue(post);
        if !*running {
            if let Some(this) = self.self_ref.upgrade() {
                *running = true;
                self.executor.execute(Box::new(move || this.run()));
            }
        }
    }

    fn run(&self) {
        // The drainer must never leave `running` set, whatever path exits it.
        // Normal exits reset the flag themselves (atomically with the final
        // empty check); the guard only covers unwinding.
        let mut reset = RunningGuard {
            flag: &self.running,
            armed: true,
        };
        loop {
            let post = match self.queue.poll_timeout(IDLE_POLL) {
                Some(post) => post,
                None => {
                    // Recheck under the monitor so an enqueue racing the idle
                    // timeout either finds us still running or starts a new
                    // drainer.
                    let mut running = self.running.lock();
                    match self.queue.poll() {
                        Some(post) => post,
                        None => {
                            *running = false;
                            drop(running);
                            reset.armed = false;
                            return;
                        }
                    }
                }
            };

            match self.bus.upgrade() {
                Some(bus) => bus.invoke_pending(post),
                None => {
                    pending::release(post);
                    *self.running.lock() = false;
                    reset.armed = false;
                    return;
                }
            }
        }
    }
}

struct RunningGuard<'a> {
    flag: &'a Mutex<bool>,
    armed: bool,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.flag.lock() = false;
        }
    }
}
