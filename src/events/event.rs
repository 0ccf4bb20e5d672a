//! # Event model: the `Event` trait and the event-type graph.
//!
//! Any `'static + Send + Sync` value can ride the bus once its type implements
//! [`Event`]. The trait is empty by default; the two provided methods exist
//! only for event-type inheritance:
//!
//! - [`Event::parent_types`] declares the direct parent event types
//!   (interface-like parents first, then the superclass-like parent), and
//! - [`Event::upcast_to`] produces a borrowed view of the value as one of its
//!   transitive parent types, so handlers declared for a parent receive a
//!   typed reference.
//!
//! With inheritance enabled (the default), posting an event delivers it to
//! handlers declared for the event's own type and for every type reachable
//! through parent links. The enumeration order is: the type itself first,
//! then each declared parent followed depth-first by its own parents, with
//! duplicates dropped.
//!
//! ## Example
//! ```
//! use std::any::{Any, TypeId};
//! use postbus::{Event, EventTypeRef};
//!
//! struct Closed;
//! impl Event for Closed {}
//!
//! struct ConnectionClosed {
//!     pub reason: String,
//!     closed: Closed,
//! }
//!
//! impl Event for ConnectionClosed {
//!     fn parent_types() -> Vec<EventTypeRef> {
//!         vec![EventTypeRef::of::<Closed>()]
//!     }
//!     fn upcast_to(&self, target: TypeId) -> Option<&dyn Any> {
//!         (target == TypeId::of::<Closed>()).then_some(&self.closed as &dyn Any)
//!     }
//! }
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashSet;
use std::sync::Arc;

/// A value that can be posted to the bus.
///
/// Implementations are usually a single empty `impl Event for T {}`. Types
/// participating in event inheritance additionally declare their parents and
/// how to view the value as each of them.
pub trait Event: Any + Send + Sync {
    /// Direct parent event types, in delivery order.
    ///
    /// Interface-like parents come first, the superclass-like parent last,
    /// mirroring how a nominal hierarchy would enumerate them.
    fn parent_types() -> Vec<EventTypeRef>
    where
        Self: Sized,
    {
        Vec::new()
    }

    /// Borrows this value as the parent type identified by `target`.
    ///
    /// Must answer for every type reachable through [`Event::parent_types`],
    /// typically by returning an embedded field or delegating one level up.
    /// The bus never asks for the exact type; that view is the value itself.
    fn upcast_to(&self, target: TypeId) -> Option<&dyn Any> {
        let _ = target;
        None
    }
}

/// A walkable reference to an event type: identity, name, and a link to the
/// next level of the parent graph.
#[derive(Clone, Copy)]
pub struct EventTypeRef {
    id: TypeId,
    name: &'static str,
    parents: fn() -> Vec<EventTypeRef>,
}

impl EventTypeRef {
    /// Captures the type reference for `E`.
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: type_name::<E>(),
            parents: E::parent_types,
        }
    }

    /// The referenced type's `TypeId`.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The referenced type's name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Direct parents of the referenced type.
    pub fn parents(&self) -> Vec<EventTypeRef> {
        (self.parents)()
    }
}

impl PartialEq for EventTypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventTypeRef {}

impl std::fmt::Debug for EventTypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTypeRef").field("name", &self.name).finish()
    }
}

/// Enumerates the full type closure of `root`: the type itself, then every
/// transitive parent in depth-first preorder, without duplicates.
pub(crate) fn type_closure(root: EventTypeRef) -> Vec<EventTypeRef> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    collect(&mut out, &mut seen, root);
    out
}

fn collect(out: &mut Vec<EventTypeRef>, seen: &mut HashSet<TypeId>, current: EventTypeRef) {
    if !seen.insert(current.id) {
        return;
    }
    out.push(current);
    for parent in current.parents() {
        collect(out, seen, parent);
    }
}

/// Type-erased upcast entry point, monomorphized per posted event type.
type UpcastFn = fn(&dyn Any, TypeId) -> Option<&dyn Any>;

fn upcast_shim<E: Event>(value: &dyn Any, target: TypeId) -> Option<&dyn Any> {
    if target == TypeId::of::<E>() {
        return Some(value);
    }
    value.downcast_ref::<E>()?.upcast_to(target)
}

/// An event as it travels through the pipeline: the shared value plus the
/// capabilities captured from its concrete type at the `post` call site.
#[derive(Clone)]
pub(crate) struct PostedEvent {
    pub(crate) value: Arc<dyn Any + Send + Sync>,
    pub(crate) type_ref: EventTypeRef,
    upcast: UpcastFn,
}

impl PostedEvent {
    pub(crate) fn new<E: Event>(event: E) -> Self {
        Self {
            value: Arc::new(event),
            type_ref: EventTypeRef::of::<E>(),
            upcast: upcast_shim::<E>,
        }
    }

    /// Borrows the event as `target`, which must be the event's own type or a
    /// member of its type closure.
    pub(crate) fn view_as(&self, target: TypeId) -> Option<&dyn Any> {
        (self.upcast)(self.value.as_ref(), target)
    }

    /// Stable identity of the posted value, for cancellation matching.
    pub(crate) fn identity(&self) -> *const () {
        Arc::as_ptr(&self.value) as *const ()
    }
}
