//! # Handler declaration and discovery.
//!
//! Subscribers describe their handlers declaratively ([`SubscriberInfo`],
//! built from [`HandlerDescriptor`] entries); the finder resolves a type's
//! full, de-duplicated handler list, walking parent links and any registered
//! [`SubscriberIndex`] tables.

mod descriptor;
mod finder;
mod index;

pub use descriptor::{HandlerDescriptor, HandlerError, ThreadMode};
pub use index::{Subscriber, SubscriberIndex, SubscriberInfo};

pub(crate) use finder::HandlerFinder;
