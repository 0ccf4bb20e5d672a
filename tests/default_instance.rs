//! Process-wide default instance semantics. Kept to a single test function
//! because the default slot is global to the test binary.

use std::sync::Arc;

use postbus::{
    Event, EventBus, EventBusError, HandlerDescriptor, Subscriber, SubscriberInfo,
};

struct Heartbeat;
impl Event for Heartbeat {}

struct Monitor {
    beats: Arc<std::sync::atomic::AtomicUsize>,
}
impl Monitor {
    fn on_heartbeat(&self, _: &Heartbeat) {
        self.beats
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}
impl Subscriber for Monitor {
    fn subscriber_info() -> SubscriberInfo {
        SubscriberInfo::new::<Monitor>()
            .with_handler(HandlerDescriptor::new("on_heartbeat", Monitor::on_heartbeat))
    }
}

#[test]
fn default_bus_is_created_once_and_install_fails_afterwards() {
    let first = EventBus::get_default();
    let second = EventBus::get_default();

    // Both handles reach the same instance: a registration through one is
    // visible through the other.
    let beats = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let monitor = Arc::new(Monitor {
        beats: beats.clone(),
    });
    first.register(&monitor).unwrap();
    assert!(second.is_registered(&monitor));

    second.post(Heartbeat).unwrap();
    assert_eq!(beats.load(std::sync::atomic::Ordering::SeqCst), 1);

    // The slot is taken, lazily; installing now is an error.
    let denied = EventBus::builder().install_default().unwrap_err();
    assert!(matches!(denied, EventBusError::DefaultAlreadyInstalled));

    first.unregister(&monitor);
}
