//! # The event bus: registry, posting pipeline, and sticky cache.
//!
//! [`EventBus`] routes typed events from publishers to the handler methods of
//! registered subscribers. Publishers call [`post`](EventBus::post) without
//! knowing who listens; subscribers declare interest through their
//! [`Subscriber::subscriber_info`] handler table and receive events on the
//! thread their descriptors ask for.
//!
//! ## Architecture
//! ```text
//! post(event)
//!     │  per-thread FIFO + re-entrance guard
//!     ▼
//! single-event dispatch ──► type closure (event inheritance)
//!     │                          │
//!     │              by_event_type[T] snapshot, priority order
//!     ▼                          ▼
//! thread-mode routing ──┬── POSTING: invoke inline
//!                       ├── MAIN / MAIN_ORDERED: MainDispatcher
//!                       ├── BACKGROUND: BackgroundDispatcher (serial)
//!                       └── ASYNC: AsyncDispatcher (parallel)
//! ```
//!
//! ## Rules
//! - Within one thread, `post` calls complete in program order; nested posts
//!   from inline handlers are queued on the same thread and drained FIFO
//!   after the current handler returns.
//! - Subscription lists are priority-sorted (descending); ties keep
//!   insertion order.
//! - `cancel_event_delivery` is valid only from a POSTING-mode handler for
//!   the event currently being delivered, and stops that event's fan-out.
//! - The sticky cache retains the most recent value per event type and
//!   replays it to late-registering sticky handlers.
//!
//! Each bus is an independent scope for events; [`EventBus::get_default`]
//! offers a process-wide instance for hosts that want a central one.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::builder::EventBusBuilder;
use crate::discovery::{HandlerDescriptor, HandlerError, HandlerFinder, Subscriber, ThreadMode};
use crate::dispatch::pending::{self, PendingPost};
use crate::dispatch::{AsyncDispatcher, BackgroundDispatcher, MainDispatcher, MainThreadSupport};
use crate::error::EventBusError;
use crate::events::{
    type_closure, Event, EventTypeRef, HandlerErrorEvent, NoSubscriberEvent, PostedEvent,
};
use crate::logger::{LogLevel, Logger};

static NEXT_BUS_ID: AtomicU64 = AtomicU64::new(0);
static DEFAULT_BUS: Mutex<Option<EventBus>> = Mutex::new(None);

thread_local! {
    static POSTING_STATES: RefCell<HashMap<u64, PostingState>> = RefCell::new(HashMap::new());
}

/// Per-thread posting state, one slot per bus.
#[derive(Default)]
struct PostingState {
    queue: VecDeque<PostedEvent>,
    is_posting: bool,
    is_main_thread: bool,
    canceled: bool,
    current_event: Option<*const ()>,
    current_mode: Option<ThreadMode>,
}

/// A handler descriptor bound to a live subscriber instance.
pub(crate) struct Subscription {
    pub(crate) subscriber: Arc<dyn Any + Send + Sync>,
    pub(crate) subscriber_key: usize,
    pub(crate) handler: HandlerDescriptor,
    /// True from creation until the owning subscriber unregisters; queued
    /// deliveries check it so a late unregister drops them silently.
    pub(crate) active: AtomicBool,
}

impl Subscription {
    pub(crate) fn new<S: Subscriber>(subscriber: Arc<S>, handler: HandlerDescriptor) -> Self {
        let subscriber_key = Arc::as_ptr(&subscriber) as *const () as usize;
        let subscriber: Arc<dyn Any + Send + Sync> = subscriber;
        Self {
            subscriber,
            subscriber_key,
            handler,
            active: AtomicBool::new(true),
        }
    }
}

#[derive(Default)]
struct Registry {
    by_event: HashMap<TypeId, Vec<Arc<Subscription>>>,
    by_subscriber: HashMap<usize, Vec<TypeId>>,
}

pub(crate) struct BusInner {
    id: u64,
    self_ref: Weak<BusInner>,
    registry: Mutex<Registry>,
    sticky: Mutex<HashMap<TypeId, PostedEvent>>,
    closures: Mutex<HashMap<TypeId, Arc<Vec<EventTypeRef>>>>,
    finder: HandlerFinder,
    main_support: Option<Arc<dyn MainThreadSupport>>,
    main_dispatcher: Option<Arc<MainDispatcher>>,
    background: Arc<BackgroundDispatcher>,
    asynchronous: Arc<AsyncDispatcher>,
    logger: Arc<dyn Logger>,
    log_handler_errors: bool,
    log_no_subscriber_events: bool,
    send_handler_error_event: bool,
    send_no_subscriber_event: bool,
    throw_handler_error: bool,
    event_inheritance: bool,
}

/// Cheap-to-clone handle to a bus instance.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Starts configuring a new bus.
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::new()
    }

    /// The process-wide default bus, built lazily with default options.
    ///
    /// Use [`EventBusBuilder::install_default`] to put a configured bus in
    /// this slot before anything touches it.
    pub fn get_default() -> EventBus {
        let mut slot = DEFAULT_BUS.lock();
        slot.get_or_insert_with(|| EventBusBuilder::new().build()).clone()
    }

    /// Registers `subscriber` for all events its handler table declares.
    ///
    /// Sticky handlers immediately receive the retained event of their type,
    /// routed through the normal thread-mode table.
    ///
    /// # Errors
    /// [`EventBusError::NoHandlers`] when the type declares nothing,
    /// [`EventBusError::AlreadyRegistered`] on a duplicate registration, and
    /// [`EventBusError::HandlerShape`] under strict verification.
    pub fn register<S: Subscriber>(&self, subscriber: &Arc<S>) -> Result<(), EventBusError> {
        self.inner.register(subscriber)
    }

    /// Removes every subscription held by `subscriber`.
    ///
    /// Unknown subscribers are logged as a warning and otherwise ignored.
    pub fn unregister<S: Subscriber>(&self, subscriber: &Arc<S>) {
        self.inner.unregister(subscriber)
    }

    /// Whether `subscriber` currently holds any subscription on this bus.
    pub fn is_registered<S: Subscriber>(&self, subscriber: &Arc<S>) -> bool {
        let key = Arc::as_ptr(subscriber) as *const () as usize;
        self.inner.registry.lock().by_subscriber.contains_key(&key)
    }

    /// Posts `event` to all matching subscriptions.
    ///
    /// Inline (POSTING-mode) handlers run before this returns; other modes
    /// are queued on their dispatchers. With `throw_handler_error(true)` a
    /// failing inline handler surfaces as
    /// [`EventBusError::HandlerFailed`].
    pub fn post<E: Event>(&self, event: E) -> Result<(), EventBusError> {
        self.inner.post_event(PostedEvent::new(event))
    }

    /// Stores `event` as the sticky value of its type, then posts it.
    pub fn post_sticky<E: Event>(&self, event: E) -> Result<(), EventBusError> {
        self.inner.post_sticky(PostedEvent::new(event))
    }

    /// Stops the current event's fan-out to lower-priority subscriptions.
    ///
    /// Valid only while a POSTING-mode handler for `event` is executing on
    /// the calling thread, and only with the exact value currently being
    /// delivered.
    pub fn cancel_event_delivery<E: Event>(&self, event: &E) -> Result<(), EventBusError> {
        self.inner
            .cancel_event_delivery(event as *const E as *const ())
    }

    /// The most recent sticky event of type `E`, if any.
    pub fn get_sticky_event<E: Event>(&self) -> Option<Arc<E>> {
        self.inner.get_sticky::<E>()
    }

    /// Removes and returns the sticky event of type `E`.
    pub fn remove_sticky_event<E: Event>(&self) -> Option<Arc<E>> {
        self.inner.remove_sticky::<E>()
    }

    /// Removes the sticky event of type `E` only if it equals `event`.
    pub fn remove_sticky_event_value<E: Event + PartialEq>(&self, event: &E) -> bool {
        self.inner.remove_sticky_value(event)
    }

    /// Drops all sticky events.
    pub fn remove_all_sticky_events(&self) {
        self.inner.sticky.lock().clear();
    }

    /// Whether any subscription exists for `E` or a type in its closure.
    pub fn has_subscriber_for_event<E: Event>(&self) -> bool {
        self.inner.has_subscriber_for(EventTypeRef::of::<E>())
    }

    /// Drops the discovery and type-closure caches (test support).
    pub fn clear_caches(&self) {
        self.inner.finder.clear_cache();
        self.inner.closures.lock().clear();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("id", &self.inner.id)
            .field("event_inheritance", &self.inner.event_inheritance)
            .finish()
    }
}

/// Installs `builder`'s bus as the process-wide default, once.
pub(crate) fn install_default(builder: EventBusBuilder) -> Result<EventBus, EventBusError> {
    let mut slot = DEFAULT_BUS.lock();
    if slot.is_some() {
        return Err(EventBusError::DefaultAlreadyInstalled);
    }
    let bus = EventBus::from_builder(builder);
    *slot = Some(bus.clone());
    Ok(bus)
}

impl EventBus {
    pub(crate) fn from_builder(builder: EventBusBuilder) -> EventBus {
        let executor = builder.executor;
        let inner = Arc::new_cyclic(|weak: &Weak<BusInner>| BusInner {
            id: NEXT_BUS_ID.fetch_add(1, Ordering::Relaxed),
            self_ref: weak.clone(),
            registry: Mutex::new(Registry::default()),
            sticky: Mutex::new(HashMap::new()),
            closures: Mutex::new(HashMap::new()),
            finder: HandlerFinder::new(
                builder.indexes,
                builder.strict_handler_verification,
                builder.ignore_registered_indexes,
            ),
            main_dispatcher: builder.main_thread_support.clone().map(|main| {
                MainDispatcher::new(main, builder.main_thread_slice, weak.clone())
            }),
            main_support: builder.main_thread_support,
            background: BackgroundDispatcher::new(executor.clone(), weak.clone()),
            asynchronous: AsyncDispatcher::new(executor, weak.clone()),
            logger: builder.logger,
            log_handler_errors: builder.log_handler_errors,
            log_no_subscriber_events: builder.log_no_subscriber_events,
            send_handler_error_event: builder.send_handler_error_event,
            send_no_subscriber_event: builder.send_no_subscriber_event,
            throw_handler_error: builder.throw_handler_error,
            event_inheritance: builder.event_inheritance,
        });
        EventBus { inner }
    }
}

impl BusInner {
    pub(crate) fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    fn handle(&self) -> Option<EventBus> {
        self.self_ref.upgrade().map(|inner| EventBus { inner })
    }

    /// True when no main-thread support is configured: main-mode handlers
    /// then run inline and background-mode handlers always queue.
    fn is_main_thread(&self) -> bool {
        self.main_support
            .as_ref()
            .map_or(true, |main| main.is_main_thread())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut PostingState) -> R) -> R {
        POSTING_STATES.with(|states| {
            let mut states = states.borrow_mut();
            f(states.entry(self.id).or_default())
        })
    }

    // ---- registration -----------------------------------------------------

    fn register<S: Subscriber>(&self, subscriber: &Arc<S>) -> Result<(), EventBusError> {
        let descriptors = self.finder.find_for::<S>()?;
        let key = Arc::as_ptr(subscriber) as *const () as usize;

        let mut replays: Vec<(Arc<Subscription>, PostedEvent)> = Vec::new();
        {
            let mut registry = self.registry.lock();
            for descriptor in descriptors.iter() {
                let subscription =
                    Arc::new(Subscription::new(subscriber.clone(), descriptor.clone()));
                Self::subscribe_locked(
                    &mut registry,
                    key,
                    type_name::<S>(),
                    subscription.clone(),
                    descriptor,
                )?;
                if descriptor.is_sticky() {
                    self.collect_sticky_replays(descriptor, &subscription, &mut replays);
                }
            }
        }

        // Replays run outside the registry monitor so an inline handler may
        // post or register without self-deadlocking.
        let is_main_thread = self.is_main_thread();
        for (subscription, event) in replays {
            self.post_to_subscription(&subscription, &event, is_main_thread)?;
        }
        Ok(())
    }

    fn subscribe_locked(
        registry: &mut Registry,
        key: usize,
        subscriber_name: &'static str,
        subscription: Arc<Subscription>,
        descriptor: &HandlerDescriptor,
    ) -> Result<(), EventBusError> {
        let list = registry.by_event.entry(descriptor.event_type()).or_default();
        let signature = descriptor.signature_key();
        if list.iter().any(|existing| {
            existing.subscriber_key == key && existing.handler.signature_key() == signature
        }) {
            return Err(EventBusError::AlreadyRegistered {
                subscriber: subscriber_name,
                event: descriptor.event_type_name(),
            });
        }

        // Descending by priority; equal priorities keep insertion order.
        let position = list
            .iter()
            .position(|existing| descriptor.priority() > existing.handler.priority())
            .unwrap_or(list.len());
        list.insert(position, subscription);

        registry
            .by_subscriber
            .entry(key)
            .or_default()
            .push(descriptor.event_type());
        Ok(())
    }

    fn collect_sticky_replays(
        &self,
        descriptor: &HandlerDescriptor,
        subscription: &Arc<Subscription>,
        replays: &mut Vec<(Arc<Subscription>, PostedEvent)>,
    ) {
        let sticky = self.sticky.lock();
        if self.event_inheritance {
            for stored in sticky.values() {
                let closure = self.closure_for(stored.type_ref);
                if closure.iter().any(|t| t.id() == descriptor.event_type()) {
                    replays.push((subscription.clone(), stored.clone()));
                }
            }
        } else if let Some(stored) = sticky.get(&descriptor.event_type()) {
            replays.push((subscription.clone(), stored.clone()));
        }
    }

    fn unregister<S: Subscriber>(&self, subscriber: &Arc<S>) {
        let key = Arc::as_ptr(subscriber) as *const () as usize;
        let mut registry = self.registry.lock();
        match registry.by_subscriber.remove(&key) {
            Some(event_types) => {
                for event_type in event_types {
                    if let Some(list) = registry.by_event.get_mut(&event_type) {
                        list.retain(|subscription| {
                            if subscription.subscriber_key == key {
                                subscription.active.store(false, Ordering::Release);
                                false
                            } else {
                                true
                            }
                        });
                    }
                }
            }
            None => {
                drop(registry);
                self.logger.log(
                    LogLevel::Warning,
                    &format!(
                        "subscriber to unregister was not registered before: {}",
                        type_name::<S>()
                    ),
                );
            }
        }
    }

    fn has_subscriber_for(&self, root: EventTypeRef) -> bool {
        let closure = self.closure_for(root);
        let registry = self.registry.lock();
        closure.iter().any(|t| {
            registry
                .by_event
                .get(&t.id())
                .is_some_and(|list| !list.is_empty())
        })
    }

    // ---- posting pipeline -------------------------------------------------

    pub(crate) fn post_event(&self, event: PostedEvent) -> Result<(), EventBusError> {
        enum Entry {
            Queued,
            Own { stale_cancel: bool },
        }

        let is_main_thread = self.is_main_thread();
        let entry = self.with_state(|state| {
            state.queue.push_back(event);
            if state.is_posting {
                Entry::Queued
            } else {
                state.is_posting = true;
                state.is_main_thread = is_main_thread;
                Entry::Own {
                    stale_cancel: state.canceled,
                }
            }
        });

        match entry {
            Entry::Queued => Ok(()),
            Entry::Own { stale_cancel } => {
                if stale_cancel {
                    self.with_state(|state| {
                        state.is_posting = false;
                        state.is_main_thread = false;
                        state.canceled = false;
                        state.queue.clear();
                    });
                    return Err(EventBusError::InternalState(
                        "cancellation flag was not reset by the previous drain".into(),
                    ));
                }

                let _reset = PostingGuard { inner: self };
                loop {
                    let next = self.with_state(|state| state.queue.pop_front());
                    let Some(next) = next else { break };
                    self.post_single(next)?;
                }
                Ok(())
            }
        }
    }

    fn post_single(&self, event: PostedEvent) -> Result<(), EventBusError> {
        let mut subscription_found = false;
        if self.event_inheritance {
            let types = self.closure_for(event.type_ref);
            for event_type in types.iter() {
                subscription_found |= self.post_single_for_type(&event, event_type.id())?;
            }
        } else {
            subscription_found = self.post_single_for_type(&event, event.type_ref.id())?;
        }

        if !subscription_found {
            if self.log_no_subscriber_events {
                self.logger.log(
                    LogLevel::Fine,
                    &format!("no subscribers registered for event {}", event.type_ref.name()),
                );
            }
            let event_type = event.type_ref.id();
            if self.send_no_subscriber_event
                && event_type != TypeId::of::<NoSubscriberEvent>()
                && event_type != TypeId::of::<HandlerErrorEvent>()
            {
                if let Some(bus) = self.handle() {
                    self.post_event(PostedEvent::new(NoSubscriberEvent {
                        bus,
                        event: event.value.clone(),
                    }))?;
                }
            }
        }
        Ok(())
    }

    fn post_single_for_type(
        &self,
        event: &PostedEvent,
        event_type: TypeId,
    ) -> Result<bool, EventBusError> {
        let subscriptions = {
            let registry = self.registry.lock();
            registry.by_event.get(&event_type).cloned()
        };
        let Some(subscriptions) = subscriptions.filter(|list| !list.is_empty()) else {
            return Ok(false);
        };

        let is_main_thread = self.with_state(|state| state.is_main_thread);
        for subscription in subscriptions {
            self.with_state(|state| {
                state.current_event = Some(event.identity());
                state.current_mode = Some(subscription.handler.thread_mode());
            });
            let outcome = self.post_to_subscription(&subscription, event, is_main_thread);
            // The cancellation flag is read only after the invocation, so a
            // cancel never skips levels within the same event.
            let aborted = self.with_state(|state| {
                let aborted = state.canceled;
                state.current_event = None;
                state.current_mode = None;
                state.canceled = false;
                aborted
            });
            outcome?;
            if aborted {
                break;
            }
        }
        Ok(true)
    }

    pub(crate) fn post_to_subscription(
        &self,
        subscription: &Arc<Subscription>,
        event: &PostedEvent,
        is_main_thread: bool,
    ) -> Result<(), EventBusError> {
        match subscription.handler.thread_mode() {
            ThreadMode::Posting => self.invoke_subscriber(subscription, event),
            ThreadMode::Main => {
                if is_main_thread {
                    self.invoke_subscriber(subscription, event)
                } else if let Some(main) = &self.main_dispatcher {
                    main.enqueue(subscription.clone(), event.clone())
                } else {
                    self.invoke_subscriber(subscription, event)
                }
            }
            ThreadMode::MainOrdered => {
                if let Some(main) = &self.main_dispatcher {
                    main.enqueue(subscription.clone(), event.clone())
                } else {
                    self.invoke_subscriber(subscription, event)
                }
            }
            ThreadMode::Background => {
                if is_main_thread {
                    self.background.enqueue(subscription.clone(), event.clone());
                    Ok(())
                } else {
                    self.invoke_subscriber(subscription, event)
                }
            }
            ThreadMode::Async => {
                self.asynchronous.enqueue(subscription.clone(), event.clone());
                Ok(())
            }
        }
    }

    /// Entry point for the dispatcher queues: unwrap, recycle the cell, skip
    /// inactive subscriptions, and contain failures.
    pub(crate) fn invoke_pending(&self, mut post: PendingPost) {
        let event = post.event.take();
        let subscription = post.subscription.take();
        pending::release(post);

        let (Some(event), Some(subscription)) = (event, subscription) else {
            self.logger
                .log(LogLevel::Severe, "pending post had empty fields");
            return;
        };
        if !subscription.active.load(Ordering::Acquire) {
            return;
        }
        if let Err(error) = self.invoke_subscriber(&subscription, &event) {
            self.logger.log(
                LogLevel::Severe,
                &format!("handler failure escaped on a dispatcher thread: {error}"),
            );
        }
    }

    fn invoke_subscriber(
        &self,
        subscription: &Arc<Subscription>,
        event: &PostedEvent,
    ) -> Result<(), EventBusError> {
        let target = subscription.handler.event_type();
        let Some(view) = event.view_as(target) else {
            return Err(EventBusError::InternalState(format!(
                "event {} cannot be viewed as {}; check its upcast_to implementation",
                event.type_ref.name(),
                subscription.handler.event_type_name()
            )));
        };

        let call = subscription.handler.stub().as_ref();
        let subscriber: &dyn Any = subscription.subscriber.as_ref();
        match catch_unwind(AssertUnwindSafe(|| call(subscriber, view))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => self.handle_handler_error(subscription, event, error),
            Err(payload) => {
                self.handle_handler_error(subscription, event, panic_message(payload).into())
            }
        }
    }

    fn handle_handler_error(
        &self,
        subscription: &Arc<Subscription>,
        event: &PostedEvent,
        error: HandlerError,
    ) -> Result<(), EventBusError> {
        if event.type_ref.id() == TypeId::of::<HandlerErrorEvent>() {
            // Never report on a report; log and stop the recursion here.
            if self.log_handler_errors {
                self.logger.log(
                    LogLevel::Severe,
                    &format!(
                        "handler-error subscriber {} failed: {error}",
                        subscription.handler.target_name()
                    ),
                );
                if let Some(original) = event.value.downcast_ref::<HandlerErrorEvent>() {
                    self.logger.log(
                        LogLevel::Severe,
                        &format!(
                            "initial event {} caused failure in {}: {}",
                            original.causing_event_type,
                            original.causing_subscriber,
                            original.error
                        ),
                    );
                }
            }
            return Ok(());
        }

        if self.throw_handler_error {
            return Err(EventBusError::HandlerFailed {
                subscriber: subscription.handler.target_name(),
                message: error.to_string(),
            });
        }
        if self.log_handler_errors {
            self.logger.log(
                LogLevel::Severe,
                &format!(
                    "could not dispatch event {} to {}: {error}",
                    event.type_ref.name(),
                    subscription.handler.target_name()
                ),
            );
        }
        if self.send_handler_error_event {
            if let Some(bus) = self.handle() {
                self.post_event(PostedEvent::new(HandlerErrorEvent {
                    bus,
                    error: Arc::from(error),
                    causing_event: event.value.clone(),
                    causing_event_type: event.type_ref.name(),
                    causing_subscriber: subscription.handler.target_name(),
                }))?;
            }
        }
        Ok(())
    }

    fn cancel_event_delivery(&self, identity: *const ()) -> Result<(), EventBusError> {
        self.with_state(|state| {
            if !state.is_posting {
                return Err(EventBusError::IllegalCancellation {
                    reason: "only a handler running inside the posting drain may cancel",
                });
            }
            if state.current_event != Some(identity) {
                return Err(EventBusError::IllegalCancellation {
                    reason: "only the event currently being delivered may be canceled",
                });
            }
            if state.current_mode != Some(ThreadMode::Posting) {
                return Err(EventBusError::IllegalCancellation {
                    reason: "only posting-mode handlers may cancel delivery",
                });
            }
            state.canceled = true;
            Ok(())
        })
    }

    // ---- sticky cache -----------------------------------------------------

    fn post_sticky(&self, event: PostedEvent) -> Result<(), EventBusError> {
        {
            let mut sticky = self.sticky.lock();
            sticky.insert(event.type_ref.id(), event.clone());
        }
        // Posted after the store, so a handler may remove it immediately.
        self.post_event(event)
    }

    fn get_sticky<E: Event>(&self) -> Option<Arc<E>> {
        let sticky = self.sticky.lock();
        sticky
            .get(&TypeId::of::<E>())
            .and_then(|stored| stored.value.clone().downcast::<E>().ok())
    }

    fn remove_sticky<E: Event>(&self) -> Option<Arc<E>> {
        let mut sticky = self.sticky.lock();
        sticky
            .remove(&TypeId::of::<E>())
            .and_then(|stored| stored.value.downcast::<E>().ok())
    }

    fn remove_sticky_value<E: Event + PartialEq>(&self, event: &E) -> bool {
        let mut sticky = self.sticky.lock();
        let matches = sticky
            .get(&TypeId::of::<E>())
            .and_then(|stored| stored.value.downcast_ref::<E>())
            .map(|stored| stored == event)
            .unwrap_or(false);
        if matches {
            sticky.remove(&TypeId::of::<E>());
        }
        matches
    }

    // ---- type closure cache ----------------------------------------------

    fn closure_for(&self, root: EventTypeRef) -> Arc<Vec<EventTypeRef>> {
        let mut cache = self.closures.lock();
        if let Some(existing) = cache.get(&root.id()) {
            return existing.clone();
        }
        let computed = Arc::new(type_closure(root));
        cache.insert(root.id(), computed.clone());
        computed
    }
}

/// Clears the posting flags on every drain exit, panics included.
struct PostingGuard<'a> {
    inner: &'a BusInner,
}

impl Drop for PostingGuard<'_> {
    fn drop(&mut self) {
        self.inner.with_state(|state| {
            state.is_posting = false;
            state.is_main_thread = false;
        });
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
