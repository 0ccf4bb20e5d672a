//! # Event types and the event-type graph.
//!
//! [`Event`] marks a value as postable and, optionally, wires it into the
//! event-type inheritance graph via [`EventTypeRef`] links. The bus's own
//! signal events ([`NoSubscriberEvent`], [`HandlerErrorEvent`]) live here too.

mod event;
mod signal;

pub use event::{Event, EventTypeRef};
pub use signal::{HandlerErrorEvent, NoSubscriberEvent};

pub(crate) use event::{type_closure, PostedEvent};
