//! # Handler discovery.
//!
//! Given a subscriber type, [`HandlerFinder`] produces the ordered list of
//! handler descriptors the registry subscribes: it walks the type's parent
//! chain, prefers builder-registered [`SubscriberIndex`] tables over a type's
//! own, and de-duplicates signatures overridden by more derived types.
//!
//! ## Rules
//! - Indexes are consulted per type, in registration order; the first index
//!   that knows the type wins. A type no index knows falls back to its own
//!   [`Subscriber::subscriber_info`](crate::Subscriber::subscriber_info) table.
//! - De-duplication is two-level: a first-per-event-type fast path, then a
//!   signature map (`method>event-type`) that keeps the most derived
//!   declaration of an overridden handler.
//! - The walk stops at the end of the parent chain, or as soon as a parent
//!   lives in a platform-reserved namespace (`std::`, `core::`, `alloc::`).
//! - A type with no handlers anywhere in its chain is an error.
//!
//! Results are cached per subscriber type. Scratch state is pooled so
//! repeated registrations do not reallocate the de-duplication maps.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::discovery::{HandlerDescriptor, Subscriber, SubscriberIndex, SubscriberInfo};
use crate::error::EventBusError;

const STATE_POOL_SIZE: usize = 4;

pub(crate) struct HandlerFinder {
    indexes: Vec<Arc<dyn SubscriberIndex>>,
    strict: bool,
    ignore_indexes: bool,
    cache: RwLock<HashMap<TypeId, Arc<Vec<HandlerDescriptor>>>>,
    pool: Mutex<Vec<FindState>>,
}

impl HandlerFinder {
    pub(crate) fn new(
        indexes: Vec<Arc<dyn SubscriberIndex>>,
        strict: bool,
        ignore_indexes: bool,
    ) -> Self {
        Self {
            indexes,
            strict,
            ignore_indexes,
            cache: RwLock::new(HashMap::new()),
            pool: Mutex::new(Vec::new()),
        }
    }

    /// Resolves (and caches) the handler descriptors of `S`.
    pub(crate) fn find_for<S: Subscriber>(
        &self,
    ) -> Result<Arc<Vec<HandlerDescriptor>>, EventBusError> {
        let key = TypeId::of::<S>();
        if let Some(found) = self.cache.read().get(&key) {
            return Ok(found.clone());
        }

        let found = self.find(S::subscriber_info, type_name::<S>())?;
        let found = Arc::new(found);
        self.cache.write().insert(key, found.clone());
        Ok(found)
    }

    /// Drops all cached discovery results (test support).
    pub(crate) fn clear_cache(&self) {
        self.cache.write().clear();
    }

    fn find(
        &self,
        root: fn() -> SubscriberInfo,
        root_name: &'static str,
    ) -> Result<Vec<HandlerDescriptor>, EventBusError> {
        let mut state = self.obtain_state();
        let result = self.walk(&mut state, root);
        self.release_state(state);

        let found = result?;
        if found.is_empty() {
            return Err(EventBusError::NoHandlers {
                subscriber: root_name,
            });
        }
        Ok(found)
    }

    fn walk(
        &self,
        state: &mut FindState,
        root: fn() -> SubscriberInfo,
    ) -> Result<Vec<HandlerDescriptor>, EventBusError> {
        let mut current = Some(root());
        let mut depth = 0usize;

        while let Some(info) = current {
            let type_id = info.type_id();
            let parent = info.parent();

            let handlers = if self.ignore_indexes {
                info.into_handlers()
            } else {
                match self.indexes.iter().find_map(|index| index.info_for(type_id)) {
                    Some(indexed) => indexed.into_handlers(),
                    None => info.into_handlers(),
                }
            };

            for descriptor in handlers {
                if self.strict && descriptor.method_name().is_empty() {
                    return Err(EventBusError::HandlerShape {
                        subscriber: descriptor.target_name(),
                        method: descriptor.method_name(),
                        reason: "handler method name is empty",
                    });
                }
                if state.check_add(&descriptor, depth, self.strict)? {
                    state.found.push(descriptor);
                }
            }

            current = parent
                .map(|next| next())
                .filter(|next| !is_reserved_type(next.type_name()));
            depth += 1;
        }

        Ok(std::mem::take(&mut state.found))
    }

    fn obtain_state(&self) -> FindState {
        self.pool.lock().pop().unwrap_or_default()
    }

    fn release_state(&self, mut state: FindState) {
        state.recycle();
        let mut pool = self.pool.lock();
        if pool.len() < STATE_POOL_SIZE {
            pool.push(state);
        }
    }
}

/// Types in these namespaces terminate the parent walk.
fn is_reserved_type(name: &str) -> bool {
    name.starts_with("std::") || name.starts_with("core::") || name.starts_with("alloc::")
}

/// Pooled scratch state for a single discovery run.
#[derive(Default)]
struct FindState {
    found: Vec<HandlerDescriptor>,
    any_by_event: HashMap<TypeId, FirstSlot>,
    class_by_sig: HashMap<String, (TypeId, usize)>,
}

/// Fast-path slot: the first handler per event type skips the signature map
/// until a second one shows up.
enum FirstSlot {
    First {
        key: String,
        target: TypeId,
        depth: usize,
    },
    Consumed,
}

impl FindState {
    fn recycle(&mut self) {
        self.found.clear();
        self.any_by_event.clear();
        self.class_by_sig.clear();
    }

    /// Two-level acceptance check for one candidate descriptor.
    fn check_add(
        &mut self,
        descriptor: &HandlerDescriptor,
        depth: usize,
        strict: bool,
    ) -> Result<bool, EventBusError> {
        let event_type = descriptor.event_type();
        match self.any_by_event.get_mut(&event_type) {
            None => {
                self.any_by_event.insert(
                    event_type,
                    FirstSlot::First {
                        key: descriptor.signature_key(),
                        target: descriptor.target_type(),
                        depth,
                    },
                );
                Ok(true)
            }
            Some(slot) => {
                if let FirstSlot::First {
                    key,
                    target,
                    depth: first_depth,
                } = std::mem::replace(slot, FirstSlot::Consumed)
                {
                    // Late-record the first handler's signature now that the
                    // event type turned out to be contested.
                    Self::check_signature(
                        &mut self.class_by_sig,
                        key,
                        target,
                        first_depth,
                        descriptor,
                        strict,
                    )?;
                }
                Self::check_signature(
                    &mut self.class_by_sig,
                    descriptor.signature_key(),
                    descriptor.target_type(),
                    depth,
                    descriptor,
                    strict,
                )
            }
        }
    }

    fn check_signature(
        class_by_sig: &mut HashMap<String, (TypeId, usize)>,
        key: String,
        target: TypeId,
        depth: usize,
        descriptor: &HandlerDescriptor,
        strict: bool,
    ) -> Result<bool, EventBusError> {
        match class_by_sig.get(&key).copied() {
            None => {
                class_by_sig.insert(key, (target, depth));
                Ok(true)
            }
            Some((recorded_target, _)) if recorded_target == target => {
                if strict {
                    Err(EventBusError::HandlerShape {
                        subscriber: descriptor.target_name(),
                        method: descriptor.method_name(),
                        reason: "duplicate handler for the same event type in one declaring type",
                    })
                } else {
                    Ok(false)
                }
            }
            Some((_, recorded_depth)) if recorded_depth > depth => {
                // The recorded declaration sits higher in the chain; the more
                // derived one replaces it.
                class_by_sig.insert(key, (target, depth));
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;

    struct Ping;
    impl Event for Ping {}

    struct Pong;
    impl Event for Pong {}

    struct Base;
    impl Base {
        fn on_ping(&self, _: &Ping) {}
        fn on_pong(&self, _: &Pong) {}
    }
    impl Subscriber for Base {
        fn subscriber_info() -> SubscriberInfo {
            SubscriberInfo::new::<Base>()
                .with_handler(HandlerDescriptor::new("on_ping", Base::on_ping))
                .with_handler(HandlerDescriptor::new("on_pong", Base::on_pong))
        }
    }

    struct Derived;
    impl Derived {
        fn on_ping(&self, _: &Ping) {}
    }
    impl Subscriber for Derived {
        fn subscriber_info() -> SubscriberInfo {
            SubscriberInfo::new::<Derived>()
                .with_handler(HandlerDescriptor::new("on_ping", Derived::on_ping))
                .with_parent(Base::subscriber_info)
        }
    }

    fn finder(strict: bool) -> HandlerFinder {
        HandlerFinder::new(Vec::new(), strict, false)
    }

    #[test]
    fn finds_own_and_inherited_handlers() {
        let found = finder(false).find_for::<Derived>().unwrap();
        let methods: Vec<(&str, &str)> = found
            .iter()
            .map(|d| (d.target_name(), d.method_name()))
            .collect();
        // The derived override wins for on_ping; on_pong is inherited.
        assert_eq!(found.len(), 2);
        assert!(methods.contains(&(std::any::type_name::<Derived>(), "on_ping")));
        assert!(methods.contains(&(std::any::type_name::<Base>(), "on_pong")));
    }

    #[test]
    fn override_rejects_parent_declaration() {
        let found = finder(false).find_for::<Derived>().unwrap();
        assert!(!found
            .iter()
            .any(|d| d.target_name() == std::any::type_name::<Base>()
                && d.method_name() == "on_ping"));
    }

    #[test]
    fn distinct_methods_for_same_event_both_survive() {
        struct Twice;
        impl Twice {
            fn first(&self, _: &Ping) {}
            fn second(&self, _: &Ping) {}
        }
        impl Subscriber for Twice {
            fn subscriber_info() -> SubscriberInfo {
                SubscriberInfo::new::<Twice>()
                    .with_handler(HandlerDescriptor::new("first", Twice::first))
                    .with_handler(HandlerDescriptor::new("second", Twice::second))
            }
        }

        let found = finder(false).find_for::<Twice>().unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn duplicate_signature_in_one_type_is_dropped_leniently() {
        struct Dup;
        impl Dup {
            fn on_ping(&self, _: &Ping) {}
        }
        impl Subscriber for Dup {
            fn subscriber_info() -> SubscriberInfo {
                SubscriberInfo::new::<Dup>()
                    .with_handler(HandlerDescriptor::new("on_ping", Dup::on_ping))
                    .with_handler(HandlerDescriptor::new("on_ping", Dup::on_ping))
            }
        }

        let found = finder(false).find_for::<Dup>().unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn duplicate_signature_in_one_type_fails_strict() {
        struct Dup;
        impl Dup {
            fn on_ping(&self, _: &Ping) {}
        }
        impl Subscriber for Dup {
            fn subscriber_info() -> SubscriberInfo {
                SubscriberInfo::new::<Dup>()
                    .with_handler(HandlerDescriptor::new("on_ping", Dup::on_ping))
                    .with_handler(HandlerDescriptor::new("on_ping", Dup::on_ping))
            }
        }

        let err = finder(true).find_for::<Dup>().unwrap_err();
        assert!(matches!(err, EventBusError::HandlerShape { .. }));
    }

    #[test]
    fn empty_table_is_no_handlers() {
        struct Silent;
        impl Subscriber for Silent {
            fn subscriber_info() -> SubscriberInfo {
                SubscriberInfo::new::<Silent>()
            }
        }

        let err = finder(false).find_for::<Silent>().unwrap_err();
        assert!(matches!(err, EventBusError::NoHandlers { .. }));
    }

    #[test]
    fn index_overrides_own_table() {
        struct IndexOnlyPong;
        impl SubscriberIndex for IndexOnlyPong {
            fn info_for(&self, subscriber_type: TypeId) -> Option<SubscriberInfo> {
                (subscriber_type == TypeId::of::<Base>()).then(|| {
                    SubscriberInfo::new::<Base>()
                        .with_handler(HandlerDescriptor::new("on_pong", Base::on_pong))
                })
            }
        }

        let finder = HandlerFinder::new(vec![Arc::new(IndexOnlyPong)], false, false);
        let found = finder.find_for::<Base>().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].method_name(), "on_pong");
    }

    #[test]
    fn ignore_indexes_uses_own_table() {
        struct EmptyIndex;
        impl SubscriberIndex for EmptyIndex {
            fn info_for(&self, _subscriber_type: TypeId) -> Option<SubscriberInfo> {
                Some(SubscriberInfo::new::<Base>())
            }
        }

        let finder = HandlerFinder::new(vec![Arc::new(EmptyIndex)], false, true);
        let found = finder.find_for::<Base>().unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn results_are_cached() {
        let finder = finder(false);
        let first = finder.find_for::<Base>().unwrap();
        let second = finder.find_for::<Base>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        finder.clear_cache();
        let third = finder.find_for::<Base>().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }
}
