//! Internal signal events posted by the bus itself.
//!
//! Both are ordinary events: subscribe to them like anything else. The bus
//! guards against storms by never reporting on its own reports (an unmatched
//! `NoSubscriberEvent` stays silent, a failing `HandlerErrorEvent` handler is
//! only logged).

use std::any::Any;
use std::error::Error;
use std::sync::Arc;

use crate::bus::EventBus;
use crate::events::Event;

/// Posted when an event matched no subscription on any of its types.
///
/// Enabled by default; disable with
/// [`send_no_subscriber_event(false)`](crate::EventBusBuilder::send_no_subscriber_event).
#[derive(Clone)]
pub struct NoSubscriberEvent {
    /// The bus the unmatched event was posted to.
    pub bus: EventBus,
    /// The unmatched event value.
    pub event: Arc<dyn Any + Send + Sync>,
}

impl Event for NoSubscriberEvent {}

/// Posted when a handler invocation fails, either by returning an error or by
/// panicking.
///
/// Enabled by default; disable with
/// [`send_handler_error_event(false)`](crate::EventBusBuilder::send_handler_error_event).
#[derive(Clone)]
pub struct HandlerErrorEvent {
    /// The bus the failing delivery ran on.
    pub bus: EventBus,
    /// The failure: the handler's error, or a panic payload rendered into one.
    pub error: Arc<dyn Error + Send + Sync>,
    /// The event whose delivery failed.
    pub causing_event: Arc<dyn Any + Send + Sync>,
    /// Type name of the event whose delivery failed.
    pub causing_event_type: &'static str,
    /// Type name of the subscriber whose handler failed.
    pub causing_subscriber: &'static str,
}

impl Event for HandlerErrorEvent {}
