//! # Error types raised by the event bus.
//!
//! All registration, configuration, and lifecycle failures surface through
//! [`EventBusError`]. Handler failures are a separate concern: they are
//! captured during invocation and routed through the configured policy
//! (logging, a [`HandlerErrorEvent`](crate::events::HandlerErrorEvent), or a
//! re-raise through `post` as [`EventBusError::HandlerFailed`]).
//!
//! Every variant provides `as_label` for stable log/metric tagging.

use thiserror::Error;

/// # Errors produced by the event bus.
///
/// Registration and configuration errors are returned to the caller
/// immediately. `HandlerFailed` is only returned from `post` when the bus was
/// built with `throw_handler_error(true)`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EventBusError {
    /// The same subscriber already holds a subscription for that event type.
    #[error("subscriber {subscriber} is already registered for event {event}")]
    AlreadyRegistered {
        /// Type name of the offending subscriber.
        subscriber: &'static str,
        /// Type name of the event the duplicate subscription targets.
        event: &'static str,
    },

    /// The subscriber type and its parent types declare no handler methods.
    #[error("subscriber {subscriber} and its parent types declare no handler methods")]
    NoHandlers {
        /// Type name of the subscriber.
        subscriber: &'static str,
    },

    /// A declared handler entry is malformed (strict verification only).
    #[error("handler {method} on {subscriber} is malformed: {reason}")]
    HandlerShape {
        /// Type name of the declaring subscriber.
        subscriber: &'static str,
        /// Name of the offending handler method.
        method: &'static str,
        /// What was wrong with the entry.
        reason: &'static str,
    },

    /// `cancel_event_delivery` was called outside its valid context.
    #[error("invalid cancellation: {reason}")]
    IllegalCancellation {
        /// Which precondition was violated.
        reason: &'static str,
    },

    /// A default bus already exists; it may only be installed once.
    #[error("default event bus already exists; it may only be installed once, before first use")]
    DefaultAlreadyInstalled,

    /// The host's main-thread channel rejected a wake-up token.
    #[error("main thread channel rejected the wake-up token")]
    MainThreadUnreachable,

    /// An internal structural precondition failed.
    #[error("queue invariant violated: {0}")]
    InvariantViolation(&'static str),

    /// Internal state was inconsistent (e.g. a stale cancellation flag, or a
    /// failed upcast during dispatch).
    #[error("internal state error: {0}")]
    InternalState(String),

    /// A handler failed and the bus is configured to re-raise through `post`.
    #[error("handler on {subscriber} failed: {message}")]
    HandlerFailed {
        /// Type name of the subscriber whose handler failed.
        subscriber: &'static str,
        /// Rendered failure message (error or panic payload).
        message: String,
    },
}

impl EventBusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventBusError::AlreadyRegistered { .. } => "bus_already_registered",
            EventBusError::NoHandlers { .. } => "bus_no_handlers",
            EventBusError::HandlerShape { .. } => "bus_handler_shape",
            EventBusError::IllegalCancellation { .. } => "bus_illegal_cancellation",
            EventBusError::DefaultAlreadyInstalled => "bus_default_already_installed",
            EventBusError::MainThreadUnreachable => "bus_main_thread_unreachable",
            EventBusError::InvariantViolation(_) => "bus_invariant_violation",
            EventBusError::InternalState(_) => "bus_internal_state",
            EventBusError::HandlerFailed { .. } => "bus_handler_failed",
        }
    }
}
