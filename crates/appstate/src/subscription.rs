#![forbid(unsafe_code)]

//! Subscription handles returned by [`Store::subscribe`](crate::Store::subscribe).
//!
//! A [`Subscription`] is an RAII guard: dropping it unsubscribes. Calling
//! [`Subscription::unsubscribe`] does the same thing eagerly and may be
//! repeated freely. [`Subscription::detach`] gives up the guard and keeps
//! the subscriber registered for as long as the store lives.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Identifier of a registered subscriber, unique within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl SubscriptionId {
    /// Raw numeric id. Ids are assigned in registration order.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Removal side of a subscriber registry, erased over the state type.
pub(crate) trait Registry {
    fn remove(&self, id: SubscriptionId);
}

/// Guard for a registered subscriber.
///
/// The `active` flag is shared with the store's registry entry. Clearing it
/// takes effect immediately, even in the middle of a notification pass, so
/// a callback never runs after `unsubscribe()` returns.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriptionId,
    active: Rc<Cell<bool>>,
    registry: Weak<dyn Registry>,
    detached: bool,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, active: Rc<Cell<bool>>, registry: Weak<dyn Registry>) -> Self {
        Self {
            id,
            active,
            registry,
            detached: false,
        }
    }

    /// Id of this subscriber.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether the callback can still be invoked.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Stop receiving notifications. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        // Store already gone: nothing left to remove.
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
        tracing::trace!(subscription = %self.id, "unsubscribed");
    }

    /// Release the guard without unsubscribing.
    ///
    /// The subscriber then lives until the store is dropped. A callback that
    /// captures a clone of the store keeps the store alive through an `Rc`
    /// cycle, so such a subscriber is never released.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active.get())
            .field("detached", &self.detached)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingRegistry {
        removed: RefCell<Vec<SubscriptionId>>,
    }

    impl Registry for RecordingRegistry {
        fn remove(&self, id: SubscriptionId) {
            self.removed.borrow_mut().push(id);
        }
    }

    fn guard(registry: &Rc<RecordingRegistry>, id: u64) -> Subscription {
        let weak: Weak<dyn Registry> = Rc::downgrade(registry) as Weak<dyn Registry>;
        Subscription::new(SubscriptionId(id), Rc::new(Cell::new(true)), weak)
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let registry = Rc::new(RecordingRegistry::default());
        let sub = guard(&registry, 7);
        sub.unsubscribe();
        sub.unsubscribe();
        drop(sub);
        assert_eq!(*registry.removed.borrow(), vec![SubscriptionId(7)]);
    }

    #[test]
    fn drop_unsubscribes() {
        let registry = Rc::new(RecordingRegistry::default());
        let sub = guard(&registry, 1);
        assert!(sub.is_active());
        drop(sub);
        assert_eq!(registry.removed.borrow().len(), 1);
    }

    #[test]
    fn detach_keeps_registration() {
        let registry = Rc::new(RecordingRegistry::default());
        guard(&registry, 2).detach();
        assert!(registry.removed.borrow().is_empty());
    }

    #[test]
    fn unsubscribe_after_registry_dropped() {
        let registry = Rc::new(RecordingRegistry::default());
        let sub = guard(&registry, 3);
        drop(registry);
        sub.unsubscribe();
        assert!(!sub.is_active());
    }

    #[test]
    fn id_display() {
        assert_eq!(SubscriptionId(12).to_string(), "sub#12");
        assert_eq!(SubscriptionId(12).get(), 12);
    }
}
