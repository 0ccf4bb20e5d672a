//! # Main-thread delivery.
//!
//! Hosts with a distinguished "main" thread (a UI loop, a game loop) plug it
//! in through [`MainThreadSupport`]; the bus then routes `Main` and
//! `MainOrdered` handlers through [`MainDispatcher`], which drains its queue
//! on that thread in cooperative time slices.
//!
//! ## Slicing
//! The drain callback records a monotonic start time and keeps invoking
//! handlers until the queue empties or the slice (default 10 ms) is used up;
//! in the latter case it posts a fresh wake-up token and returns, leaving
//! `active` set. While the queue is non-empty at least one token is always in
//! flight, so the queue never stalls and the main thread is never occupied
//! for more than one slice plus one handler at a time.
//!
//! Hosts without their own loop can use [`MainThreadLoop`], a minimal
//! implementation backed by a dedicated callback-draining thread.

use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::bus::{BusInner, Subscription};
use crate::dispatch::pending::{self, PendingPostQueue};
use crate::error::EventBusError;
use crate::events::PostedEvent;
use crate::logger::{LogLevel, Logger};

/// A wake-up token: runs one drain pass when the host's main thread gets to it.
pub type MainThreadCallback = Box<dyn FnOnce() + Send + 'static>;

/// The host's main-thread abstraction.
pub trait MainThreadSupport: Send + Sync + 'static {
    /// Whether the calling thread is the main thread.
    fn is_main_thread(&self) -> bool;

    /// Hands a callback to the main thread. Returns `false` when the channel
    /// rejected it (e.g. the loop has shut down).
    fn post_to_main(&self, callback: MainThreadCallback) -> bool;
}

/// Reference [`MainThreadSupport`] backed by a dedicated thread draining a
/// callback channel.
pub struct MainThreadLoop {
    sender: Mutex<mpsc::Sender<MainThreadCallback>>,
    thread_id: ThreadId,
}

impl MainThreadLoop {
    /// Spawns the loop thread. Dropping the value closes the channel and lets
    /// the thread exit after the callbacks already queued.
    pub fn spawn() -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<MainThreadCallback>();
        let handle = thread::Builder::new()
            .name("postbus-main".into())
            .spawn(move || {
                while let Ok(callback) = receiver.recv() {
                    callback();
                }
            })?;
        Ok(Self {
            sender: Mutex::new(sender),
            thread_id: handle.thread().id(),
        })
    }
}

impl MainThreadSupport for MainThreadLoop {
    fn is_main_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    fn post_to_main(&self, callback: MainThreadCallback) -> bool {
        self.sender.lock().send(callback).is_ok()
    }
}

/// Cooperative main-thread drainer (one per bus, when the host has a main
/// thread at all).
pub(crate) struct MainDispatcher {
    self_ref: Weak<MainDispatcher>,
    queue: PendingPostQueue,
    active: Mutex<bool>,
    slice: Duration,
    main: Arc<dyn MainThreadSupport>,
    bus: Weak<BusInner>,
}

impl MainDispatcher {
    pub(crate) fn new(
        main: Arc<dyn MainThreadSupport>,
        slice: Duration,
        bus: Weak<BusInner>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            self_ref: weak.clone(),
            queue: PendingPostQueue::new(),
            active: Mutex::new(false),
            slice,
            main,
            bus,
        })
    }

    pub(crate) fn enqueue(
        &self,
        subscription: Arc<Subscription>,
        event: PostedEvent,
    ) -> Result<(), EventBusError> {
        let post = pending::obtain(subscription, event);
        let mut active = self.active.lock();
        self.queue.enqueue(post);
        if !*active {
            *active = true;
            if !self.post_wake_token() {
                // Reset so a later enqueue can retry instead of wedging.
                *active = false;
                return Err(EventBusError::MainThreadUnreachable);
            }
        }
        Ok(())
    }

    fn post_wake_token(&self) -> bool {
        let Some(this) = self.self_ref.upgrade() else {
            return false;
        };
        self.main.post_to_main(Box::new(move || this.drain()))
    }

    /// One drain pass, invoked on the main thread via a wake-up token.
    fn drain(&self) {
        let started = Instant::now();
        loop {
            let post = match self.queue.poll() {
                Some(post) => post,
                None => {
                    // Recheck under the monitor before going idle, so an
                    // enqueue racing this drain cannot strand its token.
                    let mut active = self.active.lock();
                    match self.queue.poll() {
                        Some(post) => post,
                        None => {
                            *active = false;
                            return;
                        }
                    }
                }
            };

            if let Some(bus) = self.bus.upgrade() {
                bus.invoke_pending(post);
            } else {
                pending::release(post);
                let mut active = self.active.lock();
                *active = false;
                return;
            }

            if started.elapsed() >= self.slice {
                // Time slice used up: yield the main thread, keep `active`
                // set, and continue in a fresh callback.
                if !self.post_wake_token() {
                    let mut active = self.active.lock();
                    *active = false;
                    if let Some(bus) = self.bus.upgrade() {
                        bus.logger().log(
                            LogLevel::Severe,
                            "main thread channel rejected the continuation token; queued events stall until the next enqueue",
                        );
                    }
                }
                return;
            }
        }
    }
}
