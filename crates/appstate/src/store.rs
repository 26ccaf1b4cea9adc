#![forbid(unsafe_code)]

//! Observable application-state store with selector subscriptions.
//!
//! # Design
//!
//! [`Store<S>`] wraps one state record in shared, reference-counted storage
//! (`Rc<..>` with `RefCell`/`Cell` fields). Cloning a store clones the
//! handle, not the state. The store is built once at the application's
//! composition root and handed to whoever needs it.
//!
//! Subscribers register a *selector* (a projection of the state) and a
//! callback. After each applied update the store re-evaluates every
//! selector against the new state and invokes the callback only when the
//! projection differs from the last value that subscriber saw.
//!
//! # Invariants
//!
//! 1. The state after a sequence of updates is the left fold of those
//!    updates, applied in call order.
//! 2. An update that leaves the state equal (`PartialEq`) to the previous
//!    state does not bump the version and notifies nobody.
//! 3. Within one pass, each subscriber is notified at most once, in
//!    registration order, and only if its projection changed.
//! 4. Updates issued from inside a pass are queued and applied after the
//!    pass, each with its own pass. No callback observes a state that
//!    changes under it.
//! 5. A callback never runs after its subscription was unsubscribed.
//!
//! # Performance
//!
//! | Operation       | Complexity                              |
//! |-----------------|-----------------------------------------|
//! | `get_state()`   | O(clone S)                              |
//! | `with_state()`  | O(1) + closure                          |
//! | `set_state()`   | O(clone S + Σ selectors)                |
//! | `subscribe()`   | O(1) amortized + one selector call      |
//! | unsubscribe     | O(N) where N = subscribers              |
//!
//! # Failure Modes
//!
//! - **Panicking selector or callback**: the panic unwinds to the caller of
//!   the operation that triggered the pass. The store stays usable; updates
//!   still queued behind the failed pass are discarded with a warning.
//! - **Mutating from `with_state`**: calling `set_state` while a
//!   `with_state` closure holds the state borrow panics (RefCell rules).
//!   Read, return, then mutate.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use tracing::{debug, debug_span, trace, warn};

use crate::error::{Result, StoreError};
use crate::state::Merge;
use crate::subscription::{Registry, Subscription, SubscriptionId};

/// A queued state transition.
type Mutation<S> = Box<dyn FnOnce(&mut S)>;

/// Type-erased subscriber: re-evaluates its selector against a snapshot.
trait Watcher<S> {
    /// Returns `true` if the callback fired.
    fn observe(&self, state: &S) -> bool;
}

struct SelectorWatcher<S, T, Sel, Equals, Cb> {
    selector: Sel,
    equals: Equals,
    callback: Cb,
    /// Projection as of the last notification (or registration).
    last: RefCell<T>,
    _state: PhantomData<fn(&S)>,
}

impl<S, T, Sel, Equals, Cb> Watcher<S> for SelectorWatcher<S, T, Sel, Equals, Cb>
where
    Sel: Fn(&S) -> T,
    Equals: Fn(&T, &T) -> bool,
    Cb: Fn(&T),
{
    fn observe(&self, state: &S) -> bool {
        let next = (self.selector)(state);
        if (self.equals)(&*self.last.borrow(), &next) {
            return false;
        }
        self.last.replace(next);
        (self.callback)(&*self.last.borrow());
        true
    }
}

struct Entry<S> {
    id: SubscriptionId,
    active: Rc<Cell<bool>>,
    watcher: Rc<dyn Watcher<S>>,
}

/// Shared interior for [`Store<S>`].
struct StoreInner<S> {
    state: RefCell<S>,
    /// State produced by the initializer, kept for `reset()`.
    initial: S,
    version: Cell<u64>,
    subscribers: RefCell<Vec<Entry<S>>>,
    /// Updates issued while a pass was running.
    pending: RefCell<VecDeque<Mutation<S>>>,
    dispatching: Cell<bool>,
    next_id: Cell<u64>,
}

impl<S> Registry for StoreInner<S> {
    fn remove(&self, id: SubscriptionId) {
        let removed = {
            let mut subscribers = self.subscribers.borrow_mut();
            let index = subscribers.iter().position(|entry| entry.id == id);
            index.map(|index| subscribers.remove(index))
        };
        // Dropped outside the borrow: the callback may own subscriptions on
        // this store, and their guards re-enter `remove`.
        drop(removed);
    }
}

/// Marks the store as dispatching for the lifetime of one drain loop.
struct DispatchGuard<'a, S> {
    inner: &'a StoreInner<S>,
}

impl<'a, S> DispatchGuard<'a, S> {
    fn enter(inner: &'a StoreInner<S>) -> Self {
        inner.dispatching.set(true);
        Self { inner }
    }
}

impl<S> Drop for DispatchGuard<'_, S> {
    fn drop(&mut self) {
        self.inner.dispatching.set(false);
        if std::thread::panicking()
            && let Ok(mut pending) = self.inner.pending.try_borrow_mut()
            && !pending.is_empty()
        {
            let discarded = pending.len();
            pending.clear();
            warn!(discarded, "notification pass panicked; discarding queued updates");
        }
    }
}

/// A shared, observable application-state store.
///
/// Cloning a `Store` creates a new handle to the **same** state and
/// subscriber set.
///
/// The store is single-threaded (`!Send`, `!Sync`). Sharing state with
/// another thread needs an explicit message-passing bridge.
pub struct Store<S> {
    inner: Rc<StoreInner<S>>,
}

// Manual Clone: shares the same Rc.
impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Store");
        match self.inner.state.try_borrow() {
            Ok(state) => out.field("state", &*state),
            Err(_) => out.field("state", &"<borrowed>"),
        };
        out.field("version", &self.inner.version.get())
            .field("subscriber_count", &self.inner.subscribers.borrow().len())
            .field("pending", &self.inner.pending.borrow().len())
            .field("dispatching", &self.inner.dispatching.get())
            .finish()
    }
}

impl<S: Clone + PartialEq + 'static> Store<S> {
    /// Create a store holding `initial`.
    ///
    /// The initial version is 0 and no subscribers are registered.
    #[must_use]
    pub fn new(initial: S) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                state: RefCell::new(initial.clone()),
                initial,
                version: Cell::new(0),
                subscribers: RefCell::new(Vec::new()),
                pending: RefCell::new(VecDeque::new()),
                dispatching: Cell::new(false),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Create a store from an initializer, which runs exactly once.
    #[must_use]
    pub fn create(init: impl FnOnce() -> S) -> Self {
        Self::new(init())
    }

    /// Create a store from a fallible initializer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Construction`] carrying the initializer's error
    /// message if it fails.
    pub fn try_create<E: fmt::Display>(
        init: impl FnOnce() -> std::result::Result<S, E>,
    ) -> Result<Self> {
        match init() {
            Ok(initial) => Ok(Self::new(initial)),
            Err(err) => {
                let reason = err.to_string();
                warn!(%reason, "state initializer failed");
                Err(StoreError::Construction(reason))
            }
        }
    }

    /// Snapshot of the current state.
    ///
    /// The returned value is owned; later updates do not affect it.
    #[must_use]
    pub fn get_state(&self) -> S {
        self.inner.state.borrow().clone()
    }

    /// Access the current state by reference without cloning.
    ///
    /// `f` must not update the store.
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.state.borrow())
    }

    /// The state produced by the initializer.
    #[must_use]
    pub fn initial_state(&self) -> S {
        self.inner.initial.clone()
    }

    /// Merge `patch` into the current state, replacing only named fields.
    ///
    /// Subscribers whose projection changed are notified before this
    /// returns, unless the call is made from inside a notification pass, in
    /// which case it is applied right after that pass.
    pub fn set_state(&self, patch: S::Patch)
    where
        S: Merge,
        S::Patch: 'static,
    {
        self.dispatch(Box::new(move |state: &mut S| state.merge(patch)));
    }

    /// Update the state in place via a closure.
    ///
    /// Same notification and deferral rules as [`set_state`](Self::set_state).
    /// The closure runs against a working copy; it may read the store but
    /// any updates it issues are queued behind this one.
    pub fn update(&self, f: impl FnOnce(&mut S) + 'static) {
        self.dispatch(Box::new(f));
    }

    /// Replace the whole state.
    pub fn replace_state(&self, state: S) {
        self.dispatch(Box::new(move |current: &mut S| *current = state));
    }

    /// Restore the state produced by the initializer.
    pub fn reset(&self) {
        self.replace_state(self.initial_state());
    }

    /// Subscribe to changes of `selector(state)`, compared with `PartialEq`.
    ///
    /// The selector is evaluated once now to seed the baseline; the callback
    /// is not invoked at registration. A panicking selector propagates to
    /// this call.
    pub fn subscribe<T, Sel, Cb>(&self, selector: Sel, callback: Cb) -> Subscription
    where
        T: PartialEq + 'static,
        Sel: Fn(&S) -> T + 'static,
        Cb: Fn(&T) + 'static,
    {
        self.subscribe_with(selector, <T as PartialEq>::eq, callback)
    }

    /// Subscribe with a custom equality test on the projection.
    ///
    /// The callback fires when `equals(last, next)` is `false`.
    pub fn subscribe_with<T, Sel, Equals, Cb>(
        &self,
        selector: Sel,
        equals: Equals,
        callback: Cb,
    ) -> Subscription
    where
        T: 'static,
        Sel: Fn(&S) -> T + 'static,
        Equals: Fn(&T, &T) -> bool + 'static,
        Cb: Fn(&T) + 'static,
    {
        let baseline = self.with_state(&selector);
        let watcher: Rc<dyn Watcher<S>> = Rc::new(SelectorWatcher {
            selector,
            equals,
            callback,
            last: RefCell::new(baseline),
            _state: PhantomData,
        });

        let id = SubscriptionId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        let active = Rc::new(Cell::new(true));
        self.inner.subscribers.borrow_mut().push(Entry {
            id,
            active: Rc::clone(&active),
            watcher,
        });
        trace!(subscription = %id, "subscribed");

        let registry: Weak<dyn Registry> = Rc::downgrade(&self.inner) as Weak<dyn Registry>;
        Subscription::new(id, active, registry)
    }

    /// Subscribe to every change of the whole state.
    pub fn subscribe_all(&self, callback: impl Fn(&S) + 'static) -> Subscription {
        self.subscribe(<S as Clone>::clone, callback)
    }

    /// Number of applied, value-changing updates.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Whether a notification pass is running right now.
    #[must_use]
    pub fn is_dispatching(&self) -> bool {
        self.inner.dispatching.get()
    }

    /// Apply `mutation`, or queue it if a pass is in progress.
    fn dispatch(&self, mutation: Mutation<S>) {
        if self.inner.dispatching.get() {
            let mut pending = self.inner.pending.borrow_mut();
            pending.push_back(mutation);
            trace!(queued = pending.len(), "deferred re-entrant update");
            return;
        }

        let _guard = DispatchGuard::enter(&self.inner);
        let mut next = Some(mutation);
        while let Some(mutation) = next {
            self.apply(mutation);
            next = self.inner.pending.borrow_mut().pop_front();
        }
    }

    fn apply(&self, mutation: Mutation<S>) {
        let mut working = self.get_state();
        mutation(&mut working);
        if *self.inner.state.borrow() == working {
            trace!("update left state unchanged");
            return;
        }

        self.inner.state.replace(working.clone());
        let version = self.inner.version.get() + 1;
        self.inner.version.set(version);
        debug!(version, "state updated");
        self.notify(&working, version);
    }

    /// Run one notification pass against `snapshot`.
    fn notify(&self, snapshot: &S, version: u64) {
        let _span = debug_span!("store_dispatch", version).entered();

        // Collect first so callbacks can subscribe or unsubscribe freely.
        let watchers: Vec<(Rc<Cell<bool>>, Rc<dyn Watcher<S>>)> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|entry| (Rc::clone(&entry.active), Rc::clone(&entry.watcher)))
            .collect();

        let mut notified = 0usize;
        for (active, watcher) in &watchers {
            if active.get() && watcher.observe(snapshot) {
                notified += 1;
            }
        }
        debug!(subscribers = watchers.len(), notified, "notification pass complete");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
