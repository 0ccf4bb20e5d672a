//! # Fully-asynchronous delivery.
//!
//! Each enqueue submits exactly one pool task, and each task polls exactly one
//! pending post; tasks run concurrently with no ordering between events.

use std::sync::{Arc, Weak};

use crate::bus::{BusInner, Subscription};
use crate::dispatch::executor::Executor;
use crate::dispatch::pending::{self, PendingPostQueue};
use crate::error::EventBusError;
use crate::events::PostedEvent;
use crate::logger::{LogLevel, Logger};

pub(crate) struct AsyncDispatcher {
    self_ref: Weak<AsyncDispatcher>,
    queue: PendingPostQueue,
    executor: Arc<dyn Executor>,
    bus: Weak<BusInner>,
}

impl AsyncDispatcher {
    pub(crate) fn new(executor: Arc<dyn Executor>, bus: Weak<BusInner>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            self_ref: weak.clone(),
            queue: PendingPostQueue::new(),
            executor,
            bus,
        })
    }

    pub(crate) fn enqueue(&self, subscription: Arc<Subscription>, event: PostedEvent) {
        let post = pending::obtain(subscription, event);
        self.queue.enqueue(post);
        if let Some(this) = self.self_ref.upgrade() {
            self.executor.execute(Box::new(move || this.run_one()));
        }
    }

    fn run_one(&self) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        match self.queue.poll() {
            Some(post) => bus.invoke_pending(post),
            // Submits and polls are paired; an empty poll means the pairing
            // broke. Worker-pool tasks log instead of failing the pool.
            None => {
                let error =
                    EventBusError::InvariantViolation("async dispatch task found no pending post");
                bus.logger().log(LogLevel::Severe, &error.to_string());
            }
        }
    }
}
