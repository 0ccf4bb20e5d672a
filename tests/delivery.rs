//! Inline delivery: priority ordering, registration lifecycle, cancellation,
//! and the failure/no-subscriber policies.

mod common;

use std::sync::Arc;
use std::thread;

use common::Recorder;
use postbus::{
    Event, EventBus, EventBusError, HandlerDescriptor, HandlerErrorEvent, NoSubscriberEvent,
    Subscriber, SubscriberInfo,
};

struct Order(u32);
impl Event for Order {}

struct Quote;
impl Event for Quote {}

macro_rules! recording_subscriber {
    ($name:ident, $label:literal, $priority:expr) => {
        struct $name {
            seen: Arc<Recorder<&'static str>>,
        }
        impl $name {
            fn on_order(&self, _: &Order) {
                self.seen.record($label);
            }
        }
        impl Subscriber for $name {
            fn subscriber_info() -> SubscriberInfo {
                SubscriberInfo::new::<$name>().with_handler(
                    HandlerDescriptor::new("on_order", $name::on_order).with_priority($priority),
                )
            }
        }
    };
}

recording_subscriber!(MidPriority, "mid", 5);
recording_subscriber!(LowPriority, "low", 0);
recording_subscriber!(HighPriority, "high", 10);

#[test]
fn delivers_by_descending_priority_on_the_posting_thread() {
    let bus = EventBus::builder().send_no_subscriber_event(false).build();
    let seen = Arc::new(Recorder::new());

    let mid = Arc::new(MidPriority { seen: seen.clone() });
    let low = Arc::new(LowPriority { seen: seen.clone() });
    let high = Arc::new(HighPriority { seen: seen.clone() });

    // Registration order differs from priority order on purpose.
    bus.register(&mid).unwrap();
    bus.register(&low).unwrap();
    bus.register(&high).unwrap();

    bus.post(Order(1)).unwrap();

    // Posting mode is synchronous, so everything already ran.
    assert_eq!(seen.entries(), vec!["high", "mid", "low"]);
}

#[test]
fn equal_priorities_keep_registration_order() {
    struct First {
        seen: Arc<Recorder<&'static str>>,
    }
    impl First {
        fn on_order(&self, _: &Order) {
            self.seen.record("first");
        }
    }
    impl Subscriber for First {
        fn subscriber_info() -> SubscriberInfo {
            SubscriberInfo::new::<First>()
                .with_handler(HandlerDescriptor::new("on_order", First::on_order))
        }
    }

    struct Second {
        seen: Arc<Recorder<&'static str>>,
    }
    impl Second {
        fn on_order(&self, _: &Order) {
            self.seen.record("second");
        }
    }
    impl Subscriber for Second {
        fn subscriber_info() -> SubscriberInfo {
            SubscriberInfo::new::<Second>()
                .with_handler(HandlerDescriptor::new("on_order", Second::on_order))
        }
    }

    let bus = EventBus::builder().send_no_subscriber_event(false).build();
    let seen = Arc::new(Recorder::new());
    let first = Arc::new(First { seen: seen.clone() });
    let second = Arc::new(Second { seen: seen.clone() });

    bus.register(&first).unwrap();
    bus.register(&second).unwrap();
    bus.post(Order(2)).unwrap();

    assert_eq!(seen.entries(), vec!["first", "second"]);
}

#[test]
fn register_twice_fails_and_unregister_stops_delivery() {
    let bus = EventBus::builder().send_no_subscriber_event(false).build();
    let seen = Arc::new(Recorder::new());
    let subscriber = Arc::new(LowPriority { seen: seen.clone() });

    assert!(!bus.is_registered(&subscriber));
    bus.register(&subscriber).unwrap();
    assert!(bus.is_registered(&subscriber));

    let duplicate = bus.register(&subscriber).unwrap_err();
    assert!(matches!(duplicate, EventBusError::AlreadyRegistered { .. }));

    bus.post(Order(1)).unwrap();
    assert_eq!(seen.len(), 1);

    bus.unregister(&subscriber);
    assert!(!bus.is_registered(&subscriber));
    bus.post(Order(2)).unwrap();
    assert_eq!(seen.len(), 1);

    // Unknown unregister is a warning, not an error.
    bus.unregister(&subscriber);
}

#[test]
fn distinct_instances_of_one_type_both_receive() {
    let bus = EventBus::builder().send_no_subscriber_event(false).build();
    let seen = Arc::new(Recorder::new());
    let one = Arc::new(LowPriority { seen: seen.clone() });
    let two = Arc::new(LowPriority { seen: seen.clone() });

    bus.register(&one).unwrap();
    bus.register(&two).unwrap();
    bus.post(Order(1)).unwrap();

    assert_eq!(seen.len(), 2);
}

#[test]
fn subscriber_without_handlers_is_rejected() {
    struct Deaf;
    impl Subscriber for Deaf {
        fn subscriber_info() -> SubscriberInfo {
            SubscriberInfo::new::<Deaf>()
        }
    }

    let bus = EventBus::builder().build();
    let deaf = Arc::new(Deaf);
    assert!(matches!(
        bus.register(&deaf),
        Err(EventBusError::NoHandlers { .. })
    ));
}

struct Canceller {
    bus: EventBus,
    seen: Arc<Recorder<&'static str>>,
}
impl Canceller {
    fn on_order(&self, order: &Order) {
        self.seen.record("canceller");
        self.bus.cancel_event_delivery(order).unwrap();
    }
}
impl Subscriber for Canceller {
    fn subscriber_info() -> SubscriberInfo {
        SubscriberInfo::new::<Canceller>()
            .with_handler(HandlerDescriptor::new("on_order", Canceller::on_order).with_priority(10))
    }
}

#[test]
fn posting_handler_cancels_remaining_fanout() {
    let bus = EventBus::builder().send_no_subscriber_event(false).build();
    let seen = Arc::new(Recorder::new());
    let canceller = Arc::new(Canceller {
        bus: bus.clone(),
        seen: seen.clone(),
    });
    let low = Arc::new(LowPriority { seen: seen.clone() });

    bus.register(&canceller).unwrap();
    bus.register(&low).unwrap();

    bus.post(Order(9)).unwrap();
    assert_eq!(seen.entries(), vec!["canceller"]);

    // The flag resets between events.
    bus.unregister(&canceller);
    bus.post(Order(10)).unwrap();
    assert_eq!(seen.entries(), vec!["canceller", "low"]);
}

#[test]
fn cancellation_outside_a_handler_is_rejected() {
    let bus = EventBus::builder().build();
    let event = Order(1);
    assert!(matches!(
        bus.cancel_event_delivery(&event),
        Err(EventBusError::IllegalCancellation { .. })
    ));
}

struct Exploder;
impl Exploder {
    fn on_order(&self, _: &Order) {
        panic!("boom");
    }
}
impl Subscriber for Exploder {
    fn subscriber_info() -> SubscriberInfo {
        SubscriberInfo::new::<Exploder>()
            .with_handler(HandlerDescriptor::new("on_order", Exploder::on_order))
    }
}

struct ErrorWatcher {
    seen: Arc<Recorder<String>>,
}
impl ErrorWatcher {
    fn on_handler_error(&self, event: &HandlerErrorEvent) {
        self.seen.record(format!(
            "{}:{}",
            event.causing_subscriber.rsplit("::").next().unwrap_or(""),
            event.error
        ));
    }
}
impl Subscriber for ErrorWatcher {
    fn subscriber_info() -> SubscriberInfo {
        SubscriberInfo::new::<ErrorWatcher>().with_handler(HandlerDescriptor::new(
            "on_handler_error",
            ErrorWatcher::on_handler_error,
        ))
    }
}

#[test]
fn panicking_handler_produces_a_handler_error_event() {
    let bus = EventBus::builder()
        .log_handler_errors(false)
        .send_no_subscriber_event(false)
        .build();
    let seen = Arc::new(Recorder::new());
    let exploder = Arc::new(Exploder);
    let watcher = Arc::new(ErrorWatcher { seen: seen.clone() });

    bus.register(&exploder).unwrap();
    bus.register(&watcher).unwrap();

    // The publisher is unaffected by the panic.
    bus.post(Order(1)).unwrap();

    let entries = seen.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0], "Exploder:boom");
}

#[test]
fn fallible_handler_error_is_reported_too() {
    struct Refuser;
    impl Refuser {
        fn on_order(&self, _: &Order) -> Result<(), postbus::HandlerError> {
            Err("order rejected".into())
        }
    }
    impl Subscriber for Refuser {
        fn subscriber_info() -> SubscriberInfo {
            SubscriberInfo::new::<Refuser>()
                .with_handler(HandlerDescriptor::try_new("on_order", Refuser::on_order))
        }
    }

    let bus = EventBus::builder()
        .log_handler_errors(false)
        .send_no_subscriber_event(false)
        .build();
    let seen = Arc::new(Recorder::new());
    let refuser = Arc::new(Refuser);
    let watcher = Arc::new(ErrorWatcher { seen: seen.clone() });

    bus.register(&refuser).unwrap();
    bus.register(&watcher).unwrap();
    bus.post(Order(3)).unwrap();

    let entries = seen.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].ends_with("order rejected"));
}

#[test]
fn throw_handler_error_surfaces_through_post() {
    let bus = EventBus::builder()
        .throw_handler_error(true)
        .log_handler_errors(false)
        .build();
    let exploder = Arc::new(Exploder);
    bus.register(&exploder).unwrap();

    let error = bus.post(Order(1)).unwrap_err();
    match error {
        EventBusError::HandlerFailed { message, .. } => assert_eq!(message, "boom"),
        other => panic!("unexpected error: {other}"),
    }
}

struct NoSubscriberWatcher {
    seen: Arc<Recorder<u32>>,
}
impl NoSubscriberWatcher {
    fn on_unmatched(&self, event: &NoSubscriberEvent) {
        let order = event.event.downcast_ref::<Quote>().map(|_| 1).unwrap_or(0);
        self.seen.record(order);
    }
}
impl Subscriber for NoSubscriberWatcher {
    fn subscriber_info() -> SubscriberInfo {
        SubscriberInfo::new::<NoSubscriberWatcher>().with_handler(HandlerDescriptor::new(
            "on_unmatched",
            NoSubscriberWatcher::on_unmatched,
        ))
    }
}

#[test]
fn unmatched_event_posts_exactly_one_no_subscriber_event() {
    let bus = EventBus::builder().log_no_subscriber_events(false).build();
    let seen = Arc::new(Recorder::new());
    let watcher = Arc::new(NoSubscriberWatcher { seen: seen.clone() });
    bus.register(&watcher).unwrap();

    bus.post(Quote).unwrap();

    let entries = seen.entries();
    assert_eq!(entries, vec![1]);
}

#[test]
fn unmatched_events_without_any_watcher_do_not_recurse() {
    let bus = EventBus::builder().log_no_subscriber_events(false).build();
    // Nothing registered at all: the fallback event is itself unmatched and
    // must not trigger another one.
    bus.post(Quote).unwrap();
}

#[test]
fn nested_posts_drain_in_fifo_order() {
    struct Nester {
        bus: EventBus,
        seen: Arc<Recorder<&'static str>>,
    }
    impl Nester {
        fn on_order(&self, order: &Order) {
            if order.0 == 0 {
                self.seen.record("outer-start");
                self.bus.post(Order(1)).unwrap();
                self.bus.post(Order(2)).unwrap();
                self.seen.record("outer-end");
            } else if order.0 == 1 {
                self.seen.record("nested-one");
            } else {
                self.seen.record("nested-two");
            }
        }
    }
    impl Subscriber for Nester {
        fn subscriber_info() -> SubscriberInfo {
            SubscriberInfo::new::<Nester>()
                .with_handler(HandlerDescriptor::new("on_order", Nester::on_order))
        }
    }

    let bus = EventBus::builder().send_no_subscriber_event(false).build();
    let seen = Arc::new(Recorder::new());
    let nester = Arc::new(Nester {
        bus: bus.clone(),
        seen: seen.clone(),
    });
    bus.register(&nester).unwrap();

    bus.post(Order(0)).unwrap();

    // Nested posts run after the outer handler returns, in posting order.
    assert_eq!(
        seen.entries(),
        vec!["outer-start", "outer-end", "nested-one", "nested-two"]
    );
}

#[test]
fn posts_from_many_threads_all_deliver() {
    let bus = EventBus::builder().send_no_subscriber_event(false).build();
    let seen = Arc::new(Recorder::new());
    let subscriber = Arc::new(LowPriority { seen: seen.clone() });
    bus.register(&subscriber).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let bus = bus.clone();
            thread::spawn(move || {
                for n in 0..25 {
                    bus.post(Order(n)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(seen.len(), 200);
}
