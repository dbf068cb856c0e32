#![forbid(unsafe_code)]

//! Lazy derived values that track [`Observable`] dependencies.
//!
//! # Design
//!
//! [`Computed<T>`] owns a compute function, its cached result and one
//! subscription per dependency. A dependency change only flips the dirty
//! flag; the compute function runs on the next [`get()`](Computed::get).
//!
//! Derived flags such as "can this command run right now" or "does this
//! edit differ from its snapshot" are built from this type so binding
//! adapters can poll them cheaply.
//!
//! # Invariants
//!
//! 1. `get()` never returns a value computed before the most recent
//!    dependency change.
//! 2. The compute function runs at most once per dirty period.
//! 3. `version` increments by exactly 1 per recomputation.
//!
//! # Failure Modes
//!
//! - **Compute function panics**: the dirty flag stays set, so the next
//!   `get()` retries.
//! - **Dependency dropped**: the subscription becomes inert and the last
//!   cached value is kept.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::observable::{Observable, Subscription};

struct ComputedInner<T> {
    compute: Box<dyn Fn() -> T>,
    cached: Option<T>,
    dirty: Rc<Cell<bool>>,
    version: u64,
    /// Kept alive only so the dependency callbacks stay registered.
    _subscriptions: Vec<Subscription>,
}

/// A lazily evaluated, memoized value derived from observables.
///
/// Cloning a `Computed` creates a new handle to the **same** cache.
pub struct Computed<T> {
    inner: Rc<RefCell<ComputedInner<T>>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Computed")
            .field("cached", &inner.cached)
            .field("dirty", &inner.dirty.get())
            .field("version", &inner.version)
            .finish()
    }
}

/// Subscribe to `source` so that any change marks `dirty`.
fn mark_dirty_on<S: Clone + PartialEq + 'static>(
    source: &Observable<S>,
    dirty: &Rc<Cell<bool>>,
) -> Subscription {
    let weak: Weak<Cell<bool>> = Rc::downgrade(dirty);
    source.subscribe(move |_| {
        if let Some(flag) = weak.upgrade() {
            flag.set(true);
        }
    })
}

impl<T: Clone + 'static> Computed<T> {
    fn build(compute: Box<dyn Fn() -> T>, dirty: Rc<Cell<bool>>, subs: Vec<Subscription>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ComputedInner {
                compute,
                cached: None,
                dirty,
                version: 0,
                _subscriptions: subs,
            })),
        }
    }

    /// Derive a value from a single observable.
    pub fn from_observable<S: Clone + PartialEq + 'static>(
        source: &Observable<S>,
        map: impl Fn(&S) -> T + 'static,
    ) -> Self {
        let dirty = Rc::new(Cell::new(true));
        let sub = mark_dirty_on(source, &dirty);
        let source = source.clone();
        Self::build(Box::new(move || source.with(|v| map(v))), dirty, vec![sub])
    }

    /// Derive a value from two observables.
    pub fn from2<S1, S2>(
        s1: &Observable<S1>,
        s2: &Observable<S2>,
        map: impl Fn(&S1, &S2) -> T + 'static,
    ) -> Self
    where
        S1: Clone + PartialEq + 'static,
        S2: Clone + PartialEq + 'static,
    {
        let dirty = Rc::new(Cell::new(true));
        let subs = vec![mark_dirty_on(s1, &dirty), mark_dirty_on(s2, &dirty)];
        let (s1, s2) = (s1.clone(), s2.clone());
        Self::build(
            Box::new(move || s1.with(|a| s2.with(|b| map(a, b)))),
            dirty,
            subs,
        )
    }

    /// Derive a value from three observables.
    pub fn from3<S1, S2, S3>(
        s1: &Observable<S1>,
        s2: &Observable<S2>,
        s3: &Observable<S3>,
        map: impl Fn(&S1, &S2, &S3) -> T + 'static,
    ) -> Self
    where
        S1: Clone + PartialEq + 'static,
        S2: Clone + PartialEq + 'static,
        S3: Clone + PartialEq + 'static,
    {
        let dirty = Rc::new(Cell::new(true));
        let subs = vec![
            mark_dirty_on(s1, &dirty),
            mark_dirty_on(s2, &dirty),
            mark_dirty_on(s3, &dirty),
        ];
        let (s1, s2, s3) = (s1.clone(), s2.clone(), s3.clone());
        Self::build(
            Box::new(move || s1.with(|a| s2.with(|b| s3.with(|c| map(a, b, c))))),
            dirty,
            subs,
        )
    }

    /// Wrap a free-standing compute function.
    ///
    /// Nothing marks the result dirty except [`invalidate`](Self::invalidate);
    /// `subscriptions` are only kept alive alongside the value.
    pub fn from_fn(compute: impl Fn() -> T + 'static, subscriptions: Vec<Subscription>) -> Self {
        Self::build(Box::new(compute), Rc::new(Cell::new(true)), subscriptions)
    }

    fn refresh(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.dirty.get() || inner.cached.is_none() {
            let value = (inner.compute)();
            inner.cached = Some(value);
            inner.dirty.set(false);
            inner.version += 1;
        }
    }

    /// Current value, recomputed first if a dependency changed.
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Borrow the current value, recomputing first if needed.
    ///
    /// # Panics
    ///
    /// Panics if `f` re-enters this same `Computed`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.refresh();
        let inner = self.inner.borrow();
        match inner.cached.as_ref() {
            Some(value) => f(value),
            None => unreachable!("refresh always fills the cache"),
        }
    }

    /// Whether the next `get()` will recompute.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.borrow().dirty.get()
    }

    /// Force the next `get()` to recompute.
    pub fn invalidate(&self) {
        self.inner.borrow().dirty.set(true);
    }

    /// Number of recomputations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_dep_recomputes_on_change() {
        let source = Observable::new(10);
        let doubled = Computed::from_observable(&source, |v| v * 2);

        assert_eq!(doubled.get(), 20);
        assert_eq!(doubled.version(), 1);

        source.set(5);
        assert!(doubled.is_dirty());
        assert_eq!(doubled.get(), 10);
        assert_eq!(doubled.version(), 2);
    }

    #[test]
    fn two_deps() {
        let running = Observable::new(false);
        let allowed = Observable::new(true);
        let can_run = Computed::from2(&running, &allowed, |r, a| !r && *a);

        assert!(can_run.get());
        running.set(true);
        assert!(!can_run.get());
        running.set(false);
        allowed.set(false);
        assert!(!can_run.get());
    }

    #[test]
    fn three_deps() {
        let a = Observable::new(1);
        let b = Observable::new(2);
        let c = Observable::new(3);
        let sum = Computed::from3(&a, &b, &c, |x, y, z| x + y + z);

        assert_eq!(sum.get(), 6);
        c.set(30);
        assert_eq!(sum.get(), 33);
    }

    #[test]
    fn memoizes_between_changes() {
        let calls = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&calls);
        let source = Observable::new(3);
        let computed = Computed::from_observable(&source, move |v| {
            counter.set(counter.get() + 1);
            *v
        });

        assert_eq!(computed.get(), 3);
        assert_eq!(computed.get(), 3);
        assert_eq!(calls.get(), 1);

        // Equal write does not notify, so nothing goes dirty.
        source.set(3);
        assert!(!computed.is_dirty());
        assert_eq!(calls.get(), 1);

        source.set(4);
        assert_eq!(computed.get(), 4);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn forced_notify_dirties() {
        let token = Observable::new(());
        let computed = Computed::from_observable(&token, |_| 1);
        let _ = computed.get();
        assert!(!computed.is_dirty());

        token.notify();
        assert!(computed.is_dirty());
    }

    #[test]
    fn from_fn_needs_invalidate() {
        let source = Observable::new(2);
        let read = source.clone();
        let computed = Computed::from_fn(move || read.get() * 10, vec![]);

        assert_eq!(computed.get(), 20);
        source.set(3);
        assert_eq!(computed.get(), 20);

        computed.invalidate();
        assert_eq!(computed.get(), 30);
    }

    #[test]
    fn survives_source_drop() {
        let computed;
        {
            let source = Observable::new(42);
            computed = Computed::from_observable(&source, |v| *v);
            let _ = computed.get();
        }
        assert_eq!(computed.get(), 42);
        assert!(!computed.is_dirty());
    }

    #[test]
    fn clone_shares_cache() {
        let source = Observable::new(1);
        let a = Computed::from_observable(&source, |v| v + 1);
        let b = a.clone();
        assert_eq!(a.get(), 2);
        assert_eq!(b.version(), 1);
    }
}
