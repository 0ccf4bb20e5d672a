//! # Pending posts: the queue cells shared by all dispatchers.
//!
//! A [`PendingPost`] pairs an event with the subscription it is headed for.
//! Cells are drawn from a bounded process-wide pool so steady-state dispatch
//! does not allocate; releasing into a full pool simply drops the cell.
//!
//! [`PendingPostQueue`] is the FIFO every dispatcher drains: one monitor,
//! producers never block, consumers bound their idle waits with
//! [`poll_timeout`](PendingPostQueue::poll_timeout).

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::bus::Subscription;
use crate::events::PostedEvent;

const POOL_CAPACITY: usize = 10_000;

static POOL: Mutex<Vec<PendingPost>> = Mutex::new(Vec::new());

/// One queued delivery: an event bound to a single subscription.
pub(crate) struct PendingPost {
    pub(crate) event: Option<PostedEvent>,
    pub(crate) subscription: Option<Arc<Subscription>>,
}

/// Obtains a cell from the pool, or allocates when the pool is empty.
pub(crate) fn obtain(subscription: Arc<Subscription>, event: PostedEvent) -> PendingPost {
    let recycled = POOL.lock().pop();
    match recycled {
        Some(mut cell) => {
            cell.event = Some(event);
            cell.subscription = Some(subscription);
            cell
        }
        None => PendingPost {
            event: Some(event),
            subscription: Some(subscription),
        },
    }
}

/// Clears a cell and returns it to the pool; drops it when the pool is full.
pub(crate) fn release(mut cell: PendingPost) {
    cell.event = None;
    cell.subscription = None;
    let mut pool = POOL.lock();
    if pool.len() < POOL_CAPACITY {
        pool.push(cell);
    }
}

/// FIFO of pending posts with an optional timed wait on empty.
#[derive(Default)]
pub(crate) struct PendingPostQueue {
    inner: Mutex<VecDeque<PendingPost>>,
    nonempty: Condvar,
}

impl PendingPostQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a post and wakes all waiters. Never blocks.
    pub(crate) fn enqueue(&self, post: PendingPost) {
        let mut queue = self.inner.lock();
        queue.push_back(post);
        self.nonempty.notify_all();
    }

    /// Detaches and returns the head, if any.
    pub(crate) fn poll(&self) -> Option<PendingPost> {
        self.inner.lock().pop_front()
    }

    /// Like [`poll`](Self::poll), but waits up to `timeout` when empty.
    pub(crate) fn poll_timeout(&self, timeout: Duration) -> Option<PendingPost> {
        let mut queue = self.inner.lock();
        if queue.is_empty() {
            self.nonempty.wait_for(&mut queue, timeout);
        }
        queue.pop_front()
    }
}
