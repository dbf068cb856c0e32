#![forbid(unsafe_code)]

//! A continuously sorted observable list.
//!
//! [`SortedView`] takes an `Observable<Vec<T>>` and keeps it sorted in place.
//! The list is resorted when:
//!
//! - the list itself changes,
//! - the sort key or direction changes,
//! - any reactive cell read while resolving keys in the last pass changes.
//!
//! # Invariants
//!
//! 1. After every pass the list is ordered by the current key and direction.
//! 2. The nested-cell subscriptions are exactly the cells read by the last
//!    pass; they are dropped and rebuilt on every pass.
//! 3. A pass never triggers a nested pass, even though writing the sorted
//!    list notifies the list's own subscribers.
//! 4. Equal keys keep their relative order.
//!
//! # Failure Modes
//!
//! - A subscriber of the list that writes to the list during a pass has its
//!   write kept, but that write does not trigger another pass.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use statekit_core::{Observable, Subscription};

use crate::collate::Collator;
use crate::compare::Comparator;
use crate::options::SortOptions;
use crate::value::{Keyed, ReactiveSource, Value};

/// Parsed sort key: one path per comma-separated part. An empty path means
/// the element itself.
fn parse_key(key: &str) -> Vec<Vec<&str>> {
    let paths: Vec<Vec<&str>> = key
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.split('.').map(str::trim).collect())
        .collect();
    if paths.is_empty() {
        vec![Vec::new()]
    } else {
        paths
    }
}

/// Cells read during one pass, deduplicated by identity.
#[derive(Default)]
struct Tracker {
    cells: Vec<Rc<dyn ReactiveSource>>,
}

impl Tracker {
    fn unwrap(&mut self, mut value: Value) -> Value {
        while let Value::Cell(cell) = value {
            value = cell.current();
            let id = cell.source_id();
            if !self.cells.iter().any(|seen| seen.source_id() == id) {
                self.cells.push(cell);
            }
        }
        value
    }

    fn resolve<T: Keyed>(&mut self, item: &T, path: &[&str]) -> Value {
        let Some((first, rest)) = path.split_first() else {
            return self.unwrap(item.key_value());
        };
        let mut value = self.unwrap(item.field(first));
        for segment in rest {
            if value.is_null() {
                return Value::Null;
            }
            value = self.unwrap(value.field(segment));
        }
        value
    }
}

struct ViewInner<T> {
    source: Observable<Vec<T>>,
    sort_key: Observable<String>,
    sort_descending: Observable<bool>,
    nulls_to_bottom: Cell<bool>,
    collator: RefCell<Option<Rc<dyn Collator>>>,
    sorting: Cell<bool>,
    passes: Cell<u64>,
    dependencies: RefCell<Vec<Subscription>>,
    triggers: RefCell<Vec<Subscription>>,
}

/// Clears the in-progress flag when a pass ends, even by unwinding.
struct SortingGuard<'a>(&'a Cell<bool>);

impl Drop for SortingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Keeps an observable list sorted by a key path.
///
/// Cloning creates another handle to the same view. The view stops
/// resorting once every handle is dropped.
pub struct SortedView<T> {
    inner: Rc<ViewInner<T>>,
}

impl<T> Clone for SortedView<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> fmt::Debug for SortedView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortedView")
            .field("items", &self.inner.source.get())
            .field("sort_key", &self.inner.sort_key.get())
            .field("descending", &self.inner.sort_descending.get())
            .field("nulls_to_bottom", &self.inner.nulls_to_bottom.get())
            .field("dependencies", &self.inner.dependencies.borrow().len())
            .finish()
    }
}

impl<T> SortedView<T>
where
    T: Keyed + Clone + PartialEq + 'static,
{
    /// Sort `source` now and keep it sorted.
    #[must_use]
    pub fn new(source: &Observable<Vec<T>>, options: SortOptions) -> Self {
        let view = Self {
            inner: Rc::new(ViewInner {
                source: source.clone(),
                sort_key: Observable::new(options.key.unwrap_or_default()),
                sort_descending: Observable::new(options.descending),
                nulls_to_bottom: Cell::new(options.nulls_to_bottom),
                collator: RefCell::new(options.collator),
                sorting: Cell::new(false),
                passes: Cell::new(0),
                dependencies: RefCell::new(Vec::new()),
                triggers: RefCell::new(Vec::new()),
            }),
        };
        view.resort();

        let on_source = view.trigger();
        let on_key = view.trigger();
        let on_direction = view.trigger();
        let triggers = vec![
            view.inner.source.subscribe(move |_| on_source()),
            view.inner.sort_key.subscribe(move |_| on_key()),
            view.inner.sort_descending.subscribe(move |_| on_direction()),
        ];
        view.inner.triggers.replace(triggers);
        view
    }

    /// Wrap `items` in a fresh list and keep it sorted.
    #[must_use]
    pub fn from_vec(items: Vec<T>, options: SortOptions) -> Self {
        Self::new(&Observable::new(items), options)
    }

    fn trigger(&self) -> Rc<dyn Fn()> {
        let weak: Weak<ViewInner<T>> = Rc::downgrade(&self.inner);
        Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                SortedView { inner }.resort();
            }
        })
    }

    /// Run a sort pass now. Does nothing while a pass is already running.
    pub fn resort(&self) {
        let inner = &self.inner;
        if inner.sorting.replace(true) {
            tracing::trace!(message = "sort.suppressed");
            return;
        }
        let _guard = SortingGuard(&inner.sorting);

        drop(inner.dependencies.take());

        let key = inner.sort_key.get();
        let paths = parse_key(&key);
        let collator = inner.collator.borrow().clone();
        let comparator = Comparator {
            descending: inner.sort_descending.get(),
            nulls_to_bottom: inner.nulls_to_bottom.get(),
            collator: collator.as_deref(),
        };

        let mut tracker = Tracker::default();
        let mut decorated: Vec<(Vec<Value>, T)> = inner
            .source
            .get()
            .into_iter()
            .map(|item| {
                let keys = paths
                    .iter()
                    .map(|path| tracker.resolve(&item, path))
                    .collect();
                (keys, item)
            })
            .collect();
        decorated.sort_by(|(a, _), (b, _)| comparator.compare_keys(a, b));
        let len = decorated.len();
        inner
            .source
            .set(decorated.into_iter().map(|(_, item)| item).collect());

        let on_change = self.trigger();
        let dependencies: Vec<Subscription> = tracker
            .cells
            .iter()
            .map(|cell| cell.watch(Rc::clone(&on_change)))
            .collect();
        let dependency_count = dependencies.len();
        inner.dependencies.replace(dependencies);
        inner.passes.set(inner.passes.get() + 1);

        tracing::debug!(
            message = "sort.pass",
            key = %key,
            descending = comparator.descending,
            items = len,
            dependencies = dependency_count,
            locale = collator.as_ref().and_then(|c| c.locale()).unwrap_or("")
        );
    }

    /// Sort by `key`, or flip the direction if `key` is already the key.
    pub fn set_sort_key(&self, key: &str) {
        if self.inner.sort_key.with(|current| current == key) {
            let descending = self.inner.sort_descending.get();
            self.inner.sort_descending.set(!descending);
        } else {
            self.inner.sort_key.set(key.to_owned());
            self.inner.sort_descending.set(false);
        }
    }

    /// Replace the key without touching the direction.
    pub fn set_key(&self, key: impl Into<String>) {
        self.inner.sort_key.set(key.into());
    }

    pub fn set_descending(&self, descending: bool) {
        self.inner.sort_descending.set(descending);
    }

    pub fn set_nulls_to_bottom(&self, nulls_to_bottom: bool) {
        if self.inner.nulls_to_bottom.replace(nulls_to_bottom) != nulls_to_bottom {
            self.resort();
        }
    }

    pub fn set_collator(&self, collator: Option<Rc<dyn Collator>>) {
        self.inner.collator.replace(collator);
        self.resort();
    }

    #[must_use]
    pub fn sort_key(&self) -> String {
        self.inner.sort_key.get()
    }

    #[must_use]
    pub fn is_descending(&self) -> bool {
        self.inner.sort_descending.get()
    }

    #[must_use]
    pub fn nulls_to_bottom(&self) -> bool {
        self.inner.nulls_to_bottom.get()
    }

    /// The key as a cell, for binding adapters.
    #[must_use]
    pub fn sort_key_cell(&self) -> Observable<String> {
        self.inner.sort_key.clone()
    }

    /// The direction as a cell, for binding adapters.
    #[must_use]
    pub fn descending_cell(&self) -> Observable<bool> {
        self.inner.sort_descending.clone()
    }

    /// The sorted list itself.
    #[must_use]
    pub fn source(&self) -> Observable<Vec<T>> {
        self.inner.source.clone()
    }

    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.inner.source.get()
    }

    /// Nested cells the last pass subscribed to.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.borrow().len()
    }

    /// Passes run so far, including the initial one.
    #[must_use]
    pub fn pass_count(&self) -> u64 {
        self.inner.passes.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key_splits_and_trims() {
        assert_eq!(parse_key(""), vec![Vec::<&str>::new()]);
        assert_eq!(parse_key(" , "), vec![Vec::<&str>::new()]);
        assert_eq!(
            parse_key("last, nested.name ,id"),
            vec![vec!["last"], vec!["nested", "name"], vec!["id"]]
        );
    }

    #[test]
    fn defaults_to_identity_sort() {
        let source = Observable::new(vec![2, 3, 1]);
        let view = SortedView::new(&source, SortOptions::new());
        assert_eq!(source.get(), vec![1, 2, 3]);
        assert_eq!(view.pass_count(), 1);
    }

    #[test]
    fn source_changes_resort() {
        let source = Observable::new(vec![2, 3, 1]);
        let _view = SortedView::new(&source, SortOptions::new());
        source.update(|items| items.push(-3));
        assert_eq!(source.get(), vec![-3, 1, 2, 3]);
    }

    #[test]
    fn own_write_does_not_recurse() {
        let source = Observable::new(vec![3, 2, 1]);
        let view = SortedView::new(&source, SortOptions::new());
        let before = view.pass_count();
        source.update(|items| items.push(0));
        // One pass for the push; the pass's own write is suppressed.
        assert_eq!(view.pass_count(), before + 1);
    }

    #[test]
    fn dropping_the_view_stops_sorting() {
        let source = Observable::new(vec![2, 1]);
        let view = SortedView::new(&source, SortOptions::new());
        assert_eq!(source.subscriber_count(), 1);
        drop(view);
        assert_eq!(source.subscriber_count(), 0);
        source.update(|items| items.push(0));
        assert_eq!(source.get(), vec![1, 2, 0]);
    }

    #[test]
    fn dependencies_are_rebuilt_not_accumulated() {
        let a = Observable::new(Value::from(2));
        let b = Observable::new(Value::from(1));
        let source = Observable::new(vec![
            Value::record([("p", Value::from(a.clone()))]),
            Value::record([("p", Value::from(b.clone()))]),
        ]);
        let view = SortedView::new(&source, SortOptions::new().with_key("p"));
        assert_eq!(view.dependency_count(), 2);
        assert_eq!(a.subscriber_count(), 1);

        a.set(Value::from(0));
        view.resort();
        assert_eq!(view.dependency_count(), 2);
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 1);

        view.set_key("q");
        assert_eq!(view.dependency_count(), 0);
        assert_eq!(a.subscriber_count(), 0);
    }

    #[test]
    #[tracing_test::traced_test]
    fn passes_are_traced() {
        let _view = SortedView::from_vec(vec![1, 0], SortOptions::new());
        assert!(logs_contain("sort.pass"));
    }
}
