//! # Bus configuration.
//!
//! [`EventBusBuilder`] accumulates options and produces a configured
//! [`EventBus`]. Every option has a documented default; most hosts only ever
//! touch one or two.
//!
//! ```
//! use postbus::EventBus;
//!
//! let bus = EventBus::builder()
//!     .event_inheritance(false)
//!     .throw_handler_error(true)
//!     .build();
//! # let _ = bus;
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::bus::{self, EventBus};
use crate::discovery::SubscriberIndex;
use crate::dispatch::{CachedThreadPool, Executor, MainThreadSupport};
use crate::error::EventBusError;
use crate::logger::{Logger, TracingLogger};

/// Builder for a configured [`EventBus`].
pub struct EventBusBuilder {
    pub(crate) log_handler_errors: bool,
    pub(crate) log_no_subscriber_events: bool,
    pub(crate) send_handler_error_event: bool,
    pub(crate) send_no_subscriber_event: bool,
    pub(crate) throw_handler_error: bool,
    pub(crate) event_inheritance: bool,
    pub(crate) ignore_registered_indexes: bool,
    pub(crate) strict_handler_verification: bool,
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) main_thread_support: Option<Arc<dyn MainThreadSupport>>,
    pub(crate) main_thread_slice: Duration,
    pub(crate) logger: Arc<dyn Logger>,
    pub(crate) indexes: Vec<Arc<dyn SubscriberIndex>>,
}

impl EventBusBuilder {
    pub(crate) fn new() -> Self {
        Self {
            log_handler_errors: true,
            log_no_subscriber_events: true,
            send_handler_error_event: true,
            send_no_subscriber_event: true,
            throw_handler_error: false,
            event_inheritance: true,
            ignore_registered_indexes: false,
            strict_handler_verification: false,
            executor: Arc::new(CachedThreadPool::new()),
            main_thread_support: None,
            main_thread_slice: Duration::from_millis(10),
            logger: Arc::new(TracingLogger),
            indexes: Vec::new(),
        }
    }

    /// Log each failed handler invocation at severe level. Default: `true`.
    pub fn log_handler_errors(mut self, enabled: bool) -> Self {
        self.log_handler_errors = enabled;
        self
    }

    /// Log each unmatched event at fine level. Default: `true`.
    pub fn log_no_subscriber_events(mut self, enabled: bool) -> Self {
        self.log_no_subscriber_events = enabled;
        self
    }

    /// Post a [`HandlerErrorEvent`](crate::events::HandlerErrorEvent) when a
    /// handler fails. Default: `true`.
    pub fn send_handler_error_event(mut self, enabled: bool) -> Self {
        self.send_handler_error_event = enabled;
        self
    }

    /// Post a [`NoSubscriberEvent`](crate::events::NoSubscriberEvent) when an
    /// event matches nothing. Default: `true`.
    pub fn send_no_subscriber_event(mut self, enabled: bool) -> Self {
        self.send_no_subscriber_event = enabled;
        self
    }

    /// Re-raise inline handler failures out of `post`. Default: `false`.
    ///
    /// Meant for testing and development builds; the default policy contains
    /// failures so one broken subscriber cannot take down a publisher.
    pub fn throw_handler_error(mut self, enabled: bool) -> Self {
        self.throw_handler_error = enabled;
        self
    }

    /// Deliver events to handlers of parent event types too. Default: `true`.
    ///
    /// Disabling skips the type-closure walk per post, which measurably
    /// helps hosts posting thousands of events per second.
    pub fn event_inheritance(mut self, enabled: bool) -> Self {
        self.event_inheritance = enabled;
        self
    }

    /// Skip registered indexes during discovery and use each type's own
    /// handler table. Default: `false`.
    pub fn ignore_registered_indexes(mut self, enabled: bool) -> Self {
        self.ignore_registered_indexes = enabled;
        self
    }

    /// Fail registration on malformed handler entries instead of silently
    /// dropping them. Default: `false`.
    pub fn strict_handler_verification(mut self, enabled: bool) -> Self {
        self.strict_handler_verification = enabled;
        self
    }

    /// Worker pool for background and async delivery.
    /// Default: [`CachedThreadPool`].
    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Host main-thread adapter. Default: none (main-mode handlers run
    /// inline, background-mode handlers always queue).
    pub fn main_thread_support(mut self, main: Arc<dyn MainThreadSupport>) -> Self {
        self.main_thread_support = Some(main);
        self
    }

    /// Cooperative time slice for the main-thread drainer.
    /// Default: 10 ms.
    pub fn main_thread_slice(mut self, slice: Duration) -> Self {
        self.main_thread_slice = slice;
        self
    }

    /// Log sink. Default: [`TracingLogger`].
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Appends a handler-table index, consulted before a type's own table.
    /// Indexes are tried in the order they were added.
    pub fn add_index(mut self, index: Arc<dyn SubscriberIndex>) -> Self {
        self.indexes.push(index);
        self
    }

    /// Builds a new bus with the accumulated options.
    pub fn build(self) -> EventBus {
        EventBus::from_builder(self)
    }

    /// Builds the bus and installs it as the process-wide default.
    ///
    /// # Errors
    /// [`EventBusError::DefaultAlreadyInstalled`] when a default bus already
    /// exists, whether installed or lazily created.
    pub fn install_default(self) -> Result<EventBus, EventBusError> {
        bus::install_default(self)
    }
}
