//! # Handler descriptors.
//!
//! A [`HandlerDescriptor`] is the immutable record behind every subscription:
//! which type declared the handler, which event type it takes, how it wants to
//! be scheduled, and a type-erased invocation stub that late-binds the call.
//!
//! Descriptors are built from plain method references, so a subscriber's
//! handler table reads like a listing of its methods:
//!
//! ```
//! use postbus::{Event, HandlerDescriptor, Subscriber, SubscriberInfo, ThreadMode};
//!
//! struct Tick(pub u64);
//! impl Event for Tick {}
//!
//! struct Clock;
//! impl Clock {
//!     fn on_tick(&self, tick: &Tick) {
//!         let _ = tick.0;
//!     }
//! }
//! impl Subscriber for Clock {
//!     fn subscriber_info() -> SubscriberInfo {
//!         SubscriberInfo::new::<Clock>().with_handler(
//!             HandlerDescriptor::new("on_tick", Clock::on_tick)
//!                 .with_mode(ThreadMode::Background)
//!                 .with_priority(5),
//!         )
//!     }
//! }
//! ```

use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use crate::discovery::Subscriber;
use crate::events::Event;

/// Scheduling policy for a handler, relative to the posting thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadMode {
    /// Invoke inline on the posting thread (the default).
    Posting,
    /// Invoke on the main thread; inline when the poster already is on it.
    Main,
    /// Always queue for the main thread, even when posting from it.
    MainOrdered,
    /// Invoke serially on a background worker; inline when the poster is
    /// already off the main thread.
    Background,
    /// Invoke on a worker-pool thread, concurrently and unordered.
    Async,
}

/// Failure type handlers may return; panics are rendered into the same shape.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub(crate) type HandlerStub =
    Arc<dyn Fn(&dyn Any, &dyn Any) -> Result<(), HandlerError> + Send + Sync>;

/// Immutable description of a single handler method.
#[derive(Clone)]
pub struct HandlerDescriptor {
    target_type: TypeId,
    target_name: &'static str,
    method_name: &'static str,
    event_type: TypeId,
    event_type_name: &'static str,
    thread_mode: ThreadMode,
    priority: i32,
    sticky: bool,
    stub: HandlerStub,
}

impl HandlerDescriptor {
    /// Describes an infallible handler method of `S` taking `&E`.
    pub fn new<S, E, F>(method_name: &'static str, handler: F) -> Self
    where
        S: Subscriber,
        E: Event,
        F: Fn(&S, &E) + Send + Sync + 'static,
    {
        Self::try_new::<S, E, _>(method_name, move |subscriber, event| {
            handler(subscriber, event);
            Ok(())
        })
    }

    /// Describes a fallible handler method of `S` taking `&E`.
    ///
    /// A returned error goes through the bus's handler-failure policy exactly
    /// like a panic would.
    pub fn try_new<S, E, F>(method_name: &'static str, handler: F) -> Self
    where
        S: Subscriber,
        E: Event,
        F: Fn(&S, &E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let stub: HandlerStub = Arc::new(move |subscriber, event| {
            let subscriber = subscriber
                .downcast_ref::<S>()
                .ok_or_else(|| HandlerError::from("subscriber type mismatch in handler stub"))?;
            let event = event
                .downcast_ref::<E>()
                .ok_or_else(|| HandlerError::from("event type mismatch in handler stub"))?;
            handler(subscriber, event)
        });
        Self {
            target_type: TypeId::of::<S>(),
            target_name: type_name::<S>(),
            method_name,
            event_type: TypeId::of::<E>(),
            event_type_name: type_name::<E>(),
            thread_mode: ThreadMode::Posting,
            priority: 0,
            sticky: false,
            stub,
        }
    }

    /// Sets the thread mode (default [`ThreadMode::Posting`]).
    pub fn with_mode(mut self, mode: ThreadMode) -> Self {
        self.thread_mode = mode;
        self
    }

    /// Sets the priority (default 0). Higher priorities are delivered first
    /// within an event type.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Marks the handler sticky: on registration it immediately receives the
    /// retained sticky event of its type, if one exists.
    pub fn sticky(mut self) -> Self {
        self.sticky = true;
        self
    }

    pub(crate) fn target_type(&self) -> TypeId {
        self.target_type
    }

    pub(crate) fn target_name(&self) -> &'static str {
        self.target_name
    }

    pub(crate) fn method_name(&self) -> &'static str {
        self.method_name
    }

    pub(crate) fn event_type(&self) -> TypeId {
        self.event_type
    }

    pub(crate) fn event_type_name(&self) -> &'static str {
        self.event_type_name
    }

    pub(crate) fn thread_mode(&self) -> ThreadMode {
        self.thread_mode
    }

    pub(crate) fn priority(&self) -> i32 {
        self.priority
    }

    pub(crate) fn is_sticky(&self) -> bool {
        self.sticky
    }

    pub(crate) fn stub(&self) -> &HandlerStub {
        &self.stub
    }

    /// Signature key used for hierarchy de-duplication:
    /// `method-name '>' event-type-name`.
    pub(crate) fn signature_key(&self) -> String {
        let mut key = String::with_capacity(
            self.method_name.len() + 1 + self.event_type_name.len(),
        );
        key.push_str(self.method_name);
        key.push('>');
        key.push_str(self.event_type_name);
        key
    }
}

impl std::fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("target", &self.target_name)
            .field("method", &self.method_name)
            .field("event", &self.event_type_name)
            .field("mode", &self.thread_mode)
            .field("priority", &self.priority)
            .field("sticky", &self.sticky)
            .finish()
    }
}
