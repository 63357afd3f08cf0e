//! The back handler registry.
//!
//! [`HandlerRegistry`] keeps every registered handler in a list sorted by
//! descending [`Priority`]. Handlers with equal priority stay in the order
//! they were added. A dispatch walks that list from the top and stops at
//! the first handler that consumes the event.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use backstack_core::HandlerRegistry;
//!
//! let registry = HandlerRegistry::new();
//! let order = Arc::new(Mutex::new(Vec::new()));
//!
//! for (name, priority, consume) in [("a", 10, false), ("b", 5, false), ("c", 10, true)] {
//!     let order = Arc::clone(&order);
//!     registry.add(
//!         move || {
//!             order.lock().unwrap().push(name);
//!             consume
//!         },
//!         priority,
//!     );
//! }
//!
//! registry.dispatch();
//! assert_eq!(*order.lock().unwrap(), ["a", "c"]);
//! ```
//!
//! # Locking
//!
//! All mutations and the dispatch snapshot take one mutex. Handlers run
//! after the lock is released, so a handler may add or remove handlers on
//! the same registry; those changes apply from the next dispatch.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{Level, debug, error, info, span, trace};

use crate::error::SourceResult;
use crate::handler::{BackHandler, BoxedHandler, into_handler};
use crate::id::HandlerId;
use crate::outcome::DispatchOutcome;
use crate::policy::FailurePolicy;
use crate::priority::Priority;
use crate::source::{BackEventSource, BackListener, Subscription};

#[derive(Clone)]
struct HandlerEntry {
    id: HandlerId,
    handler: BoxedHandler,
    priority: Priority,
}

#[derive(Default)]
struct RegistryState {
    /// Sorted by descending priority, stable among equals.
    entries: Vec<HandlerEntry>,
    next_id: u64,
    policy: FailurePolicy,
}

#[derive(Default)]
struct RegistryInner {
    state: Mutex<RegistryState>,
    /// Held separately so releasing it never runs under the state lock.
    subscription: Mutex<Option<Subscription>>,
}

impl RegistryInner {
    fn remove(&self, id: HandlerId) -> bool {
        let mut state = self.state.lock();
        let Some(pos) = state.entries.iter().position(|e| e.id == id) else {
            return false;
        };
        let removed = state.entries.remove(pos);
        drop(state);
        // Dropping a handler may run user code that touches the registry.
        drop(removed);

        debug!(handler = %id, "Removed back handler");
        true
    }
}

/// A priority-ordered chain of back handlers.
///
/// Cloning is cheap and clones share the same handler list.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    inner: Arc<RegistryInner>,
}

impl HandlerRegistry {
    /// Creates an empty registry with [`FailurePolicy::Propagate`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the failure policy (builder pattern).
    pub fn with_policy(self, policy: FailurePolicy) -> Self {
        self.set_policy(policy);
        self
    }

    /// Changes the failure policy for subsequent dispatches.
    pub fn set_policy(&self, policy: FailurePolicy) {
        self.inner.state.lock().policy = policy;
    }

    /// Returns the current failure policy.
    pub fn policy(&self) -> FailurePolicy {
        self.inner.state.lock().policy
    }

    /// Registers a handler and returns its id.
    ///
    /// The handler is placed after every handler with a priority greater
    /// than or equal to its own. Never fails.
    pub fn add<H>(&self, handler: H, priority: impl Into<Priority>) -> HandlerId
    where
        H: BackHandler,
    {
        self.add_boxed(into_handler(handler), priority)
    }

    /// Registers a pre-built boxed handler.
    pub fn add_boxed(&self, handler: BoxedHandler, priority: impl Into<Priority>) -> HandlerId {
        let priority = priority.into();

        let mut state = self.inner.state.lock();
        state.next_id += 1;
        let id = HandlerId::from_raw(state.next_id);

        let pos = state.entries.partition_point(|e| e.priority >= priority);
        state.entries.insert(
            pos,
            HandlerEntry {
                id,
                handler,
                priority,
            },
        );
        let count = state.entries.len();
        drop(state);

        debug!(handler = %id, %priority, position = pos, count, "Registered back handler");
        id
    }

    /// Registers a handler that is removed again when the returned guard is
    /// dropped.
    pub fn register<H>(&self, handler: H, priority: impl Into<Priority>) -> HandlerGuard
    where
        H: BackHandler,
    {
        let id = self.add(handler, priority);
        HandlerGuard {
            id,
            registry: Arc::downgrade(&self.inner),
            armed: true,
        }
    }

    /// Removes the handler with the given id.
    ///
    /// Unknown ids are ignored. Returns whether a handler was removed.
    pub fn remove(&self, id: HandlerId) -> bool {
        self.inner.remove(id)
    }

    /// Returns whether a handler with the given id is registered.
    pub fn contains(&self, id: HandlerId) -> bool {
        self.inner.state.lock().entries.iter().any(|e| e.id == id)
    }

    /// Returns the number of registered handlers.
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    /// Returns whether no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().entries.is_empty()
    }

    /// Removes every handler. Ids already handed out are not reused.
    pub fn clear(&self) {
        let entries = std::mem::take(&mut self.inner.state.lock().entries);
        drop(entries);
    }

    /// Returns `(id, priority)` pairs in dispatch order.
    pub fn priorities(&self) -> Vec<(HandlerId, Priority)> {
        self.inner
            .state
            .lock()
            .entries
            .iter()
            .map(|e| (e.id, e.priority))
            .collect()
    }

    /// Runs one back event through the chain.
    ///
    /// Nothing is reported back; use [`dispatch_outcome`](Self::dispatch_outcome)
    /// to find out whether the event was consumed.
    pub fn dispatch(&self) {
        let _ = self.dispatch_outcome();
    }

    /// Runs one back event through the chain and reports what happened.
    ///
    /// Handlers are invoked from highest to lowest priority until one
    /// returns `true`. With no consumer, every handler runs exactly once.
    pub fn dispatch_outcome(&self) -> DispatchOutcome {
        let (snapshot, policy) = {
            let state = self.inner.state.lock();
            let snapshot: Vec<(HandlerId, BoxedHandler)> = state
                .entries
                .iter()
                .map(|e| (e.id, Arc::clone(&e.handler)))
                .collect();
            (snapshot, state.policy)
        };

        let span = span!(Level::DEBUG, "dispatch", handlers = snapshot.len(), %policy);
        let _enter = span.enter();

        let mut outcome = DispatchOutcome::default();

        for (id, handler) in snapshot {
            trace!(handler = %id, "Invoking back handler");
            outcome.invoked += 1;

            let consumed = match policy {
                FailurePolicy::Propagate => handler.handle(),
                FailurePolicy::Isolate => {
                    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle())) {
                        Ok(consumed) => consumed,
                        Err(payload) => {
                            error!(
                                handler = %id,
                                panic = panic_message(payload.as_ref()),
                                "Back handler panicked, skipping"
                            );
                            outcome.failures.push(id);
                            false
                        }
                    }
                }
            };

            if consumed {
                debug!(handler = %id, "Back event consumed, stopping dispatch");
                outcome.consumed_by = Some(id);
                break;
            }
        }

        if !outcome.is_consumed() {
            debug!(invoked = outcome.invoked, "No handler consumed the back event");
        }

        outcome
    }

    /// Subscribes this registry to a back event source.
    ///
    /// Each event from the source runs [`dispatch_outcome`](Self::dispatch_outcome)
    /// and reports whether it was consumed. A previous subscription is
    /// released before the new one is made. The listener holds only a weak
    /// reference, so the source never keeps the registry alive.
    pub fn attach(&self, source: &dyn BackEventSource) -> SourceResult<()> {
        self.detach();

        let weak = Arc::downgrade(&self.inner);
        let listener: BackListener = Arc::new(move || match weak.upgrade() {
            Some(inner) => HandlerRegistry { inner }.dispatch_outcome().is_consumed(),
            None => false,
        });

        let subscription = source.subscribe(listener)?;
        let previous = self.inner.subscription.lock().replace(subscription);
        if let Some(previous) = previous {
            previous.dispose();
        }

        info!(source = source.name(), "Attached handler registry to back event source");
        Ok(())
    }

    /// Releases the current source subscription, if any.
    ///
    /// Returns whether a subscription was held.
    pub fn detach(&self) -> bool {
        let subscription = self.inner.subscription.lock().take();
        match subscription {
            Some(subscription) => {
                subscription.dispose();
                true
            }
            None => false,
        }
    }

    /// Returns whether the registry is subscribed to a source.
    pub fn is_attached(&self) -> bool {
        self.inner.subscription.lock().is_some()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("HandlerRegistry")
            .field("handler_count", &state.entries.len())
            .field("policy", &state.policy)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Keeps a handler registered for as long as it is alive.
///
/// Returned by [`HandlerRegistry::register`]. Dropping the guard removes
/// the handler; [`forget`](Self::forget) leaves it registered.
#[must_use = "dropping the guard unregisters the handler immediately"]
pub struct HandlerGuard {
    id: HandlerId,
    registry: Weak<RegistryInner>,
    armed: bool,
}

impl HandlerGuard {
    /// Returns the id of the guarded handler.
    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Disarms the guard and returns the id. The handler stays registered
    /// until removed by id.
    pub fn forget(mut self) -> HandlerId {
        self.armed = false;
        self.id
    }
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        if self.armed
            && let Some(inner) = self.registry.upgrade()
        {
            inner.remove(self.id);
        }
    }
}

impl fmt::Debug for HandlerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerGuard")
            .field("id", &self.id)
            .field("armed", &self.armed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn recorder(
        log: &Log,
        name: &'static str,
        consume: bool,
    ) -> impl Fn() -> bool + Send + Sync + 'static {
        let log = Arc::clone(log);
        move || {
            log.lock().push(name);
            consume
        }
    }

    #[test]
    fn test_dispatch_empty_registry() {
        let registry = HandlerRegistry::new();
        let outcome = registry.dispatch_outcome();

        assert!(!outcome.is_consumed());
        assert_eq!(outcome.invoked, 0);
        registry.dispatch();
    }

    #[test]
    fn test_priority_order_with_stable_ties() {
        let log = Log::default();
        let registry = HandlerRegistry::new();

        registry.add(recorder(&log, "low", false), -3);
        registry.add(recorder(&log, "a", false), 10);
        registry.add(recorder(&log, "mid", false), 0);
        registry.add(recorder(&log, "b", false), 10);
        registry.add(recorder(&log, "top", false), 10.5);
        registry.add(recorder(&log, "c", false), 10);

        registry.dispatch();

        assert_eq!(*log.lock(), ["top", "a", "b", "c", "mid", "low"]);
    }

    #[test]
    fn test_first_consumer_wins() {
        let log = Log::default();
        let registry = HandlerRegistry::new();

        let _a = registry.add(recorder(&log, "hA", false), 10);
        let _b = registry.add(recorder(&log, "hB", true), 5);
        let c = registry.add(recorder(&log, "hC", true), 10);

        let outcome = registry.dispatch_outcome();

        assert_eq!(*log.lock(), ["hA", "hC"]);
        assert_eq!(outcome.consumed_by, Some(c));
        assert_eq!(outcome.invoked, 2);
    }

    #[test]
    fn test_no_consumer_invokes_every_handler_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = HandlerRegistry::new();

        for priority in [3, 1, 2, 1] {
            let counter = Arc::clone(&counter);
            registry.add(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    false
                },
                priority,
            );
        }

        let outcome = registry.dispatch_outcome();

        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(outcome.invoked, 4);
        assert!(!outcome.is_consumed());
    }

    #[test]
    fn test_remove() {
        let log = Log::default();
        let registry = HandlerRegistry::new();

        let a = registry.add(recorder(&log, "a", false), 1);
        registry.add(recorder(&log, "b", false), 2);

        assert!(registry.remove(a));
        assert!(!registry.contains(a));
        registry.dispatch();

        assert_eq!(*log.lock(), ["b"]);
    }

    #[test]
    fn test_remove_is_idempotent_and_ignores_unknown_ids() {
        let registry = HandlerRegistry::new();
        let a = registry.add(|| false, 1);
        let b = registry.add(|| false, 2);

        assert!(registry.remove(a));
        let before = registry.priorities();

        assert!(!registry.remove(a));
        assert!(!registry.remove(HandlerId::from_raw(999)));

        assert_eq!(registry.priorities(), before);
        assert!(registry.contains(b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ids_are_unique() {
        let registry = HandlerRegistry::new();
        let a = registry.add(|| false, 0);
        let b = registry.add(|| false, 0);
        assert_ne!(a, b);

        registry.clear();
        assert!(registry.is_empty());

        let c = registry.add(|| false, 0);
        assert_ne!(c, a);
        assert_ne!(c, b);
    }

    #[test]
    fn test_guard_removes_on_drop() {
        let registry = HandlerRegistry::new();

        let guard = registry.register(|| true, 1);
        let id = guard.id();
        assert!(registry.contains(id));

        drop(guard);
        assert!(!registry.contains(id));
    }

    #[test]
    fn test_guard_forget_keeps_handler() {
        let registry = HandlerRegistry::new();

        let id = registry.register(|| true, 1).forget();
        assert!(registry.contains(id));
        assert!(registry.remove(id));
    }

    #[test]
    fn test_guard_outliving_registry() {
        let registry = HandlerRegistry::new();
        let guard = registry.register(|| true, 1);
        drop(registry);
        drop(guard);
    }

    #[test]
    fn test_clear_drops_handlers_outside_lock() {
        let registry = HandlerRegistry::new();
        let guard = Mutex::new(Some(registry.register(|| false, 0)));
        registry.add(move || guard.lock().is_some(), 1);

        // Dropping the second handler drops the first one's guard.
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reentrant_mutation_applies_to_next_dispatch() {
        let log = Log::default();
        let registry = HandlerRegistry::new();

        let late = {
            let registry = registry.clone();
            let log = Arc::clone(&log);
            move || {
                registry.add(recorder(&log, "late", false), 100);
                log.lock().push("adder");
                false
            }
        };
        let adder = registry.add(late, 10);
        registry.add(recorder(&log, "tail", false), 0);

        registry.dispatch();
        assert_eq!(*log.lock(), ["adder", "tail"]);

        registry.remove(adder);
        log.lock().clear();

        registry.dispatch();
        assert_eq!(*log.lock(), ["late", "tail"]);
    }

    #[test]
    fn test_isolate_policy_skips_panicking_handler() {
        let log = Log::default();
        let registry = HandlerRegistry::new().with_policy(FailurePolicy::Isolate);

        let bad = registry.add(|| -> bool { panic!("boom") }, 10);
        let good = registry.add(recorder(&log, "good", true), 5);

        let outcome = registry.dispatch_outcome();

        assert_eq!(outcome.failures, vec![bad]);
        assert_eq!(outcome.consumed_by, Some(good));
        assert_eq!(outcome.invoked, 2);
        assert_eq!(*log.lock(), ["good"]);
    }

    #[test]
    fn test_propagate_policy_unwinds_and_keeps_registry() {
        let reached = Arc::new(AtomicBool::new(false));
        let registry = HandlerRegistry::new();
        assert_eq!(registry.policy(), FailurePolicy::Propagate);

        registry.add(|| -> bool { panic!("boom") }, 10);
        {
            let reached = Arc::clone(&reached);
            registry.add(
                move || {
                    reached.store(true, Ordering::SeqCst);
                    true
                },
                5,
            );
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| registry.dispatch()));

        assert!(result.is_err());
        assert!(!reached.load(Ordering::SeqCst));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_nan_priority_runs_last() {
        let log = Log::default();
        let registry = HandlerRegistry::new();

        registry.add(recorder(&log, "nan", false), f64::NAN);
        registry.add(recorder(&log, "floor", false), f64::MIN);

        registry.dispatch();
        assert_eq!(*log.lock(), ["floor", "nan"]);
    }

    // ========================================================================
    // Source attachment
    // ========================================================================

    #[derive(Default)]
    struct TestSource {
        listeners: Arc<Mutex<Vec<(usize, BackListener)>>>,
        next: AtomicUsize,
        released: Arc<AtomicUsize>,
        closed: AtomicBool,
        exclusive: AtomicBool,
    }

    impl TestSource {
        fn press(&self) -> bool {
            let listeners: Vec<BackListener> = self
                .listeners
                .lock()
                .iter()
                .map(|(_, l)| Arc::clone(l))
                .collect();
            listeners.iter().any(|l| l())
        }

        fn listener_count(&self) -> usize {
            self.listeners.lock().len()
        }
    }

    impl BackEventSource for TestSource {
        fn name(&self) -> &str {
            "test"
        }

        fn subscribe(&self, listener: BackListener) -> SourceResult<Subscription> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(SourceError::closed("test"));
            }
            if self.exclusive.load(Ordering::SeqCst) && self.listener_count() > 0 {
                return Err(SourceError::rejected("test already has a listener"));
            }

            let key = self.next.fetch_add(1, Ordering::SeqCst);
            self.listeners.lock().push((key, listener));

            let listeners = Arc::clone(&self.listeners);
            let released = Arc::clone(&self.released);
            Ok(Subscription::new("test", move || {
                listeners.lock().retain(|(k, _)| *k != key);
                released.fetch_add(1, Ordering::SeqCst);
            }))
        }
    }

    #[test]
    fn test_attach_dispatches_from_source() {
        let source = TestSource::default();
        let registry = HandlerRegistry::new();
        registry.attach(&source).unwrap();
        assert!(registry.is_attached());

        assert!(!source.press());

        let guard = registry.register(|| true, 1);
        assert!(source.press());

        drop(guard);
        assert!(!source.press());
    }

    #[test]
    fn test_reattach_releases_previous_subscription() {
        let source = TestSource::default();
        let registry = HandlerRegistry::new();

        registry.attach(&source).unwrap();
        registry.attach(&source).unwrap();

        assert_eq!(source.released.load(Ordering::SeqCst), 1);
        assert_eq!(source.listener_count(), 1);
    }

    #[test]
    fn test_detach_releases_exactly_once() {
        let source = TestSource::default();
        let registry = HandlerRegistry::new();
        registry.attach(&source).unwrap();

        assert!(registry.detach());
        assert!(!registry.detach());
        drop(registry);

        assert_eq!(source.released.load(Ordering::SeqCst), 1);
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn test_dropping_registry_releases_subscription() {
        let source = TestSource::default();
        let registry = HandlerRegistry::new();
        let clone = registry.clone();
        registry.attach(&source).unwrap();

        drop(registry);
        assert_eq!(source.released.load(Ordering::SeqCst), 0);

        drop(clone);
        assert_eq!(source.released.load(Ordering::SeqCst), 1);
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn test_attach_to_closed_source_fails() {
        let source = TestSource::default();
        source.closed.store(true, Ordering::SeqCst);

        let registry = HandlerRegistry::new();
        assert!(matches!(
            registry.attach(&source),
            Err(SourceError::Closed { .. })
        ));
        assert!(!registry.is_attached());
    }

    #[test]
    fn test_rejected_attach_leaves_other_registry_attached() {
        let source = TestSource::default();
        source.exclusive.store(true, Ordering::SeqCst);

        let owner = HandlerRegistry::new();
        owner.attach(&source).unwrap();
        let _modal = owner.register(|| true, 1);

        let intruder = HandlerRegistry::new();
        let err = intruder.attach(&source).unwrap_err();
        assert!(matches!(err, SourceError::Rejected(_)));
        assert_eq!(err.to_string(), "subscription rejected: test already has a listener");

        assert!(!intruder.is_attached());
        assert!(owner.is_attached());
        assert_eq!(source.listener_count(), 1);
        assert!(source.press());

        // The owner re-subscribes in place.
        owner.attach(&source).unwrap();
        assert_eq!(source.listener_count(), 1);
    }
}
