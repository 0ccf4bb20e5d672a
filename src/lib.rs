//! # postbus
//!
//! **postbus** is an in-process publish/subscribe event bus: publishers post
//! typed values, the bus routes each one to the handler methods of every
//! registered subscriber interested in that type, on the thread each handler
//! asked for.
//!
//! ## Features
//!
//! | Area                 | Description                                                        | Key types / traits                          |
//! |----------------------|--------------------------------------------------------------------|---------------------------------------------|
//! | **Posting**          | `post` / `post_sticky` with per-thread FIFO drainage.              | [`EventBus`]                                |
//! | **Subscribers**      | Declarative handler tables with priorities and sticky flags.       | [`Subscriber`], [`SubscriberInfo`], [`HandlerDescriptor`] |
//! | **Thread modes**     | Inline, main-thread (sliced), serial background, parallel async.   | [`ThreadMode`], [`MainThreadSupport`], [`Executor`] |
//! | **Event inheritance**| Deliver to handlers of declared parent event types.                | [`Event`], [`EventTypeRef`]                 |
//! | **Sticky events**    | Replay the latest value of a type to late subscribers.             | [`EventBus::post_sticky`]                   |
//! | **Failure policy**   | Contain, log, report, or re-raise handler failures.                | [`HandlerErrorEvent`], [`NoSubscriberEvent`], [`EventBusError`] |
//!
//! ## Example
//!
//! ```
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//! use postbus::{Event, EventBus, HandlerDescriptor, Subscriber, SubscriberInfo};
//!
//! struct PriceChanged {
//!     pub cents: u64,
//! }
//! impl Event for PriceChanged {}
//!
//! #[derive(Default)]
//! struct Ticker {
//!     last: AtomicU64,
//! }
//! impl Ticker {
//!     fn on_price(&self, event: &PriceChanged) {
//!         self.last.store(event.cents, Ordering::Relaxed);
//!     }
//! }
//! impl Subscriber for Ticker {
//!     fn subscriber_info() -> SubscriberInfo {
//!         SubscriberInfo::new::<Ticker>()
//!             .with_handler(HandlerDescriptor::new("on_price", Ticker::on_price))
//!     }
//! }
//!
//! # fn main() -> Result<(), postbus::EventBusError> {
//! let bus = EventBus::builder().build();
//! let ticker = Arc::new(Ticker::default());
//!
//! bus.register(&ticker)?;
//! bus.post(PriceChanged { cents: 1299 })?;
//! assert_eq!(ticker.last.load(Ordering::Relaxed), 1299);
//!
//! bus.unregister(&ticker);
//! # Ok(())
//! # }
//! ```
//!
//! ## Threads
//!
//! The bus never creates threads of its own accord: main-thread delivery
//! goes through the host's [`MainThreadSupport`] adapter, and background /
//! async delivery submits tasks to the configured [`Executor`]. The bundled
//! defaults ([`MainThreadLoop`], [`CachedThreadPool`]) are for hosts that do
//! not bring their own.
//!
//! ---

mod builder;
mod bus;
mod discovery;
mod dispatch;
mod error;
mod events;
mod logger;

// ---- Public re-exports ----

pub use builder::EventBusBuilder;
pub use bus::EventBus;
pub use discovery::{
    HandlerDescriptor, HandlerError, Subscriber, SubscriberIndex, SubscriberInfo, ThreadMode,
};
pub use dispatch::{
    CachedThreadPool, Executor, Job, MainThreadCallback, MainThreadLoop, MainThreadSupport,
};
pub use error::EventBusError;
pub use events::{Event, EventTypeRef, HandlerErrorEvent, NoSubscriberEvent};
pub use logger::{LogLevel, Logger, TracingLogger};
