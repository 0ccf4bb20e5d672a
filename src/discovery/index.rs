//! # Subscriber self-description and external handler indexes.
//!
//! A subscriber type describes its own handlers through
//! [`Subscriber::subscriber_info`]; the returned [`SubscriberInfo`] is the
//! handler table plus an optional parent link, so a type built on top of
//! another subscriber inherits its handlers the way a subclass would.
//!
//! Hosts with generated handler tables register them as [`SubscriberIndex`]
//! values on the builder; indexes are consulted before a type's own table,
//! in registration order.

use std::any::{type_name, Any, TypeId};

use crate::discovery::HandlerDescriptor;

/// A type whose values can be registered on the bus.
pub trait Subscriber: Any + Send + Sync {
    /// The handler table for this type.
    ///
    /// Called once per type; the result is cached by the bus.
    fn subscriber_info() -> SubscriberInfo
    where
        Self: Sized;
}

/// A subscriber type's handler table and its position in the type hierarchy.
pub struct SubscriberInfo {
    type_id: TypeId,
    type_name: &'static str,
    handlers: Vec<HandlerDescriptor>,
    parent: Option<fn() -> SubscriberInfo>,
}

impl SubscriberInfo {
    /// Starts an empty table for `S`.
    pub fn new<S: Subscriber>() -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            type_name: type_name::<S>(),
            handlers: Vec::new(),
            parent: None,
        }
    }

    /// Appends a handler descriptor.
    pub fn with_handler(mut self, descriptor: HandlerDescriptor) -> Self {
        self.handlers.push(descriptor);
        self
    }

    /// Links the parent type's table; discovery walks the link upward and
    /// de-duplicates overridden signatures.
    pub fn with_parent(mut self, parent: fn() -> SubscriberInfo) -> Self {
        self.parent = Some(parent);
        self
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn into_handlers(self) -> Vec<HandlerDescriptor> {
        self.handlers
    }

    pub(crate) fn parent(&self) -> Option<fn() -> SubscriberInfo> {
        self.parent
    }
}

/// A registry of pre-built handler tables, consulted during discovery before
/// a type's own [`Subscriber::subscriber_info`].
pub trait SubscriberIndex: Send + Sync + 'static {
    /// The handler table for `subscriber_type`, if this index carries one.
    fn info_for(&self, subscriber_type: TypeId) -> Option<SubscriberInfo>;
}
