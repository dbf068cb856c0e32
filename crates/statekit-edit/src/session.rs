#![forbid(unsafe_code)]

//! Edit sessions over a single observable value.
//!
//! # Model
//!
//! An [`Editable<T>`] pairs an [`Observable<T>`] with:
//!
//! - an `is_editing` flag,
//! - a rollback stack of snapshots, newest last, pushed once per
//!   [`begin_edit`](Editable::begin_edit) and popped once per
//!   [`rollback`](Editable::rollback) or [`cancel_edit`](Editable::cancel_edit),
//! - at most one cancelled value, recoverable once through
//!   [`undo_cancel`](Editable::undo_cancel).
//!
//! ```text
//!            begin_edit (push snapshot)
//!   Idle ─────────────────────────────────▶ Editing
//!    ▲  ◀──────── end_edit (keep value) ─────  │
//!    │  ◀──── cancel_edit (pop + restore) ─────┘
//!    │                 │ stores cancelled value
//!    └── undo_cancel ──┘ (begin_edit + reapply)
//! ```
//!
//! # Invariants
//!
//! 1. The stack grows only in `begin_edit` and shrinks only in `rollback`
//!    and `cancel_edit`, one entry per call.
//! 2. Equal consecutive commits are separate entries; nothing is coalesced.
//! 3. A cancelled value exists only between a `cancel_edit` and the next
//!    `begin_edit`, `rollback` or `undo_cancel`.
//! 4. `rollback` never touches `is_editing`.
//!
//! The cancelled value is captured from the live value before the stack is
//! popped.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use statekit_core::{Computed, Observable, Subscription};

use crate::node::EditableNode;

struct EditableInner<T> {
    value: Observable<T>,
    is_editing: Observable<bool>,
    history: RefCell<Vec<T>>,
    cancelled: RefCell<Option<T>>,
    /// Bumped on every stack change so derived flags see history-only moves.
    revision: Observable<u64>,
}

/// An observable value with begin/end/cancel edit semantics and multi-level
/// rollback.
///
/// Cloning creates another handle to the same session; handles compare equal
/// only when they share it.
pub struct Editable<T> {
    inner: Rc<EditableInner<T>>,
}

/// An edit session over a list, snapshotted by element-wise copy.
pub type EditableVec<T> = Editable<Vec<T>>;

impl<T> Clone for Editable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Editable<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: fmt::Debug + Clone + PartialEq + 'static> fmt::Debug for Editable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editable")
            .field("value", &self.inner.value)
            .field("is_editing", &self.inner.is_editing.get())
            .field("history", &self.inner.history.borrow().len())
            .finish()
    }
}

impl<T: Default + Clone + PartialEq + 'static> Default for Editable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> Editable<T> {
    /// Create a session holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self::from_observable(Observable::new(initial))
    }

    /// Add edit semantics to an existing cell. Writes through either handle
    /// are the same writes.
    #[must_use]
    pub fn from_observable(value: Observable<T>) -> Self {
        Self {
            inner: Rc::new(EditableInner {
                value,
                is_editing: Observable::new(false),
                history: RefCell::new(Vec::new()),
                cancelled: RefCell::new(None),
                revision: Observable::new(0),
            }),
        }
    }

    /// The underlying cell.
    #[must_use]
    pub fn observable(&self) -> &Observable<T> {
        &self.inner.value
    }

    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.value.with(f)
    }

    pub fn set(&self, value: T) {
        self.inner.value.set(value);
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.inner.value.update(f);
    }

    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.inner.value.subscribe(callback)
    }

    /// The editing flag as a cell, for adapters that watch it.
    #[must_use]
    pub fn editing_flag(&self) -> Observable<bool> {
        self.inner.is_editing.clone()
    }

    #[must_use]
    pub fn is_editing(&self) -> bool {
        self.inner.is_editing.get()
    }

    /// Number of snapshots on the rollback stack.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.inner.history.borrow().len()
    }

    /// Whether an `undo_cancel` would currently do anything.
    #[must_use]
    pub fn has_cancelled(&self) -> bool {
        self.inner.cancelled.borrow().is_some()
    }

    fn bump_revision(&self) {
        self.inner.revision.update(|r| *r = r.wrapping_add(1));
    }

    pub fn begin_edit(&self) {
        if self.is_editing() {
            return;
        }
        self.inner.cancelled.replace(None);
        let snapshot = self.get();
        self.inner.history.borrow_mut().push(snapshot);
        self.bump_revision();
        tracing::debug!(message = "edit.begin", depth = self.history_len());
        self.inner.is_editing.set(true);
    }

    pub fn end_edit(&self) {
        if !self.is_editing() {
            return;
        }
        tracing::debug!(message = "edit.end", depth = self.history_len());
        self.inner.is_editing.set(false);
    }

    pub fn cancel_edit(&self) {
        if !self.is_editing() {
            return;
        }
        let Some(previous) = self.inner.history.borrow_mut().pop() else {
            return;
        };
        self.inner.cancelled.replace(Some(self.get()));
        self.bump_revision();
        tracing::debug!(message = "edit.cancel", depth = self.history_len());
        self.inner.value.set(previous);
        self.inner.is_editing.set(false);
    }

    pub fn undo_cancel(&self) {
        // begin_edit clears the pending value, so take it first.
        let Some(value) = self.inner.cancelled.borrow_mut().take() else {
            return;
        };
        tracing::debug!(message = "edit.undo_cancel");
        self.begin_edit();
        self.inner.value.set(value);
    }

    pub fn rollback(&self) {
        let Some(previous) = self.inner.history.borrow_mut().pop() else {
            return;
        };
        self.inner.cancelled.replace(None);
        self.bump_revision();
        tracing::debug!(
            message = "edit.rollback",
            depth = self.history_len(),
            editing = self.is_editing()
        );
        self.inner.value.set(previous);
    }

    /// Whether an open edit holds a value different from its snapshot.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        if !self.is_editing() {
            return false;
        }
        let history = self.inner.history.borrow();
        match history.last() {
            Some(snapshot) => self.inner.value.with(|current| current != snapshot),
            None => false,
        }
    }

    /// A derived view of [`is_dirty`](Self::is_dirty) that recomputes only
    /// when the value, the editing flag or the stack changed.
    #[must_use]
    pub fn dirty_flag(&self) -> Computed<bool> {
        let session = Rc::downgrade(&self.inner);
        Computed::from3(
            &self.inner.value,
            &self.inner.is_editing,
            &self.inner.revision,
            move |current, editing, _| {
                if !*editing {
                    return false;
                }
                session.upgrade().is_some_and(|inner| {
                    inner
                        .history
                        .borrow()
                        .last()
                        .is_some_and(|snapshot| snapshot != current)
                })
            },
        )
    }
}

impl<T: Clone + PartialEq + 'static> Editable<Vec<T>> {
    /// Create a list session; `None` starts empty.
    #[must_use]
    pub fn from_option(initial: Option<Vec<T>>) -> Self {
        Self::new(initial.unwrap_or_default())
    }

    pub fn push(&self, item: T) {
        self.update(|items| items.push(item));
    }

    /// Remove `delete` elements starting at `start` and insert `insert` in
    /// their place, returning the removed elements. Out-of-range bounds are
    /// clamped.
    pub fn splice(&self, start: usize, delete: usize, insert: Vec<T>) -> Vec<T> {
        let mut removed = Vec::new();
        self.update(|items| {
            let start = start.min(items.len());
            let end = start.saturating_add(delete).min(items.len());
            removed = items.splice(start..end, insert).collect();
        });
        removed
    }

    pub fn remove(&self, index: usize) -> Option<T> {
        let mut removed = None;
        self.update(|items| {
            if index < items.len() {
                removed = Some(items.remove(index));
            }
        });
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.with(Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.with(Vec::is_empty)
    }
}

impl<T: Clone + PartialEq + 'static> EditableNode for Editable<T> {
    fn begin_edit(&self) {
        Editable::begin_edit(self);
    }

    fn end_edit(&self) {
        Editable::end_edit(self);
    }

    fn cancel_edit(&self) {
        Editable::cancel_edit(self);
    }

    fn undo_cancel(&self) {
        Editable::undo_cancel(self);
    }

    fn rollback(&self) {
        Editable::rollback(self);
    }

    fn is_editing(&self) -> bool {
        Editable::is_editing(self)
    }

    fn is_dirty(&self) -> bool {
        Editable::is_dirty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(e: &Editable<&'static str>, value: &'static str) {
        e.begin_edit();
        e.set(value);
        e.end_edit();
    }

    #[test]
    fn starts_with_initial_value_and_not_editing() {
        let e = Editable::new("initial");
        assert_eq!(e.get(), "initial");
        assert!(!e.is_editing());

        let empty: Editable<Option<String>> = Editable::default();
        assert_eq!(empty.get(), None);
    }

    #[test]
    fn begin_edit_is_idempotent() {
        let e = Editable::new(1);
        e.begin_edit();
        e.begin_edit();
        assert!(e.is_editing());
        assert_eq!(e.history_len(), 1);
    }

    #[test]
    fn end_and_cancel_without_begin_do_nothing() {
        let e = Editable::new(1);
        e.end_edit();
        e.cancel_edit();
        assert!(!e.is_editing());
        assert_eq!(e.get(), 1);
    }

    #[test]
    fn cancel_reverts() {
        let e: Editable<Option<&str>> = Editable::default();
        e.begin_edit();
        e.set(Some("new value"));
        e.cancel_edit();
        assert_eq!(e.get(), None);

        e.set(Some("another value"));
        e.begin_edit();
        e.set(Some("another new value"));
        e.cancel_edit();
        assert_eq!(e.get(), Some("another value"));

        e.cancel_edit();
        e.cancel_edit();
        assert_eq!(e.get(), Some("another value"));
    }

    #[test]
    fn cancel_after_end_has_no_effect() {
        let e = Editable::new("a");
        commit(&e, "new value");
        e.cancel_edit();
        assert_eq!(e.get(), "new value");
    }

    #[test]
    fn rollback_without_history_keeps_value() {
        let e = Editable::new("initial");
        e.rollback();
        assert_eq!(e.get(), "initial");
    }

    fn rollback_walk(rollback_while_editing: bool) {
        let e = Editable::new("initial");

        e.begin_edit();
        e.set("uncommitted 1");
        e.set("committed 1");
        e.end_edit();

        e.begin_edit();
        e.set("cancelled");
        e.cancel_edit();

        commit(&e, "duplicate");
        commit(&e, "duplicate");

        e.begin_edit();
        e.set("uncommitted 2");
        e.set("committed 2");
        e.end_edit();

        commit(&e, "duplicate");

        if rollback_while_editing {
            e.begin_edit();
            e.set("edited value");
            e.rollback();
            assert_eq!(e.get(), "duplicate");
            assert!(e.is_editing(), "rollback must leave the edit open");
        }

        assert_eq!(e.get(), "duplicate");
        for expected in ["committed 2", "duplicate", "duplicate", "committed 1", "initial", "initial"] {
            e.rollback();
            assert_eq!(e.get(), expected);
        }
    }

    #[test]
    fn rollback_restores_committed_values() {
        rollback_walk(false);
    }

    #[test]
    fn rollback_while_editing_keeps_edit_open() {
        rollback_walk(true);
    }

    #[test]
    fn undo_cancel_restores_cancelled_value_once() {
        let e = Editable::new("initial");
        commit(&e, "committed 1");
        commit(&e, "committed 2");

        e.begin_edit();
        e.set("cancelled");
        e.cancel_edit();
        assert_eq!(e.get(), "committed 2");

        e.undo_cancel();
        assert_eq!(e.get(), "cancelled");
        assert!(e.is_editing());

        e.undo_cancel();
        assert_eq!(e.get(), "cancelled");
        assert!(e.is_editing());

        e.cancel_edit();
        assert_eq!(e.get(), "committed 2");
    }

    #[test]
    fn undo_cancel_without_cancel_is_noop() {
        let e = Editable::new("initial");
        e.undo_cancel();
        assert_eq!(e.get(), "initial");
        assert!(!e.is_editing());
    }

    #[test]
    fn rollback_clears_cancelled_value() {
        let e = Editable::new("initial");
        commit(&e, "committed 1");
        commit(&e, "committed 2");
        e.begin_edit();
        e.set("cancelled");
        e.cancel_edit();

        e.rollback();
        assert_eq!(e.get(), "committed 1");
        assert!(!e.has_cancelled());

        e.undo_cancel();
        assert_eq!(e.get(), "committed 1");
        assert!(!e.is_editing());
    }

    #[test]
    fn begin_edit_clears_cancelled_value() {
        let e = Editable::new("initial");
        commit(&e, "committed 1");
        e.begin_edit();
        e.set("cancelled");
        e.cancel_edit();

        e.begin_edit();
        e.undo_cancel();
        assert_eq!(e.get(), "committed 1");
        assert!(e.is_editing());
    }

    #[test]
    fn dirty_tracks_value_difference() {
        let e = Editable::new(vec![1, 2]);
        let flag = e.dirty_flag();
        assert!(!e.is_dirty());
        assert!(!flag.get());

        e.begin_edit();
        assert!(!e.is_dirty());
        e.push(3);
        assert!(e.is_dirty());
        assert!(flag.get());

        // Deep equality, not identity.
        e.set(vec![1, 2]);
        assert!(!e.is_dirty());
        assert!(!flag.get());

        e.push(9);
        e.end_edit();
        assert!(!e.is_dirty());
        assert!(!flag.get());
    }

    #[test]
    fn dirty_flag_sees_history_only_moves() {
        let e = Editable::new("a");
        commit(&e, "b");
        e.begin_edit();
        let flag = e.dirty_flag();
        assert!(!flag.get());

        // Value stays "b" but the snapshot underneath becomes "a".
        e.rollback();
        assert_eq!(e.get(), "b");
        assert_eq!(flag.get(), e.is_dirty());
    }

    #[test]
    fn editable_vec_behaves_as_editable() {
        let list: EditableVec<i32> = Editable::from_option(None);
        assert!(list.is_empty());
        list.push(1);
        list.push(2);
        list.push(3);

        list.begin_edit();
        let removed = list.splice(0, 2, vec![]);
        assert_eq!(removed, vec![1, 2]);
        list.push(4);
        list.push(1);
        assert_eq!(list.get(), vec![3, 4, 1]);

        list.cancel_edit();
        assert_eq!(list.get(), vec![1, 2, 3]);

        list.undo_cancel();
        assert_eq!(list.get(), vec![3, 4, 1]);
        list.cancel_edit();

        list.begin_edit();
        list.push(4);
        list.end_edit();
        assert_eq!(list.get(), vec![1, 2, 3, 4]);

        list.rollback();
        assert_eq!(list.get(), vec![1, 2, 3]);
        assert_eq!(list.remove(7), None);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn wraps_existing_observable() {
        let cell = Observable::new(5);
        let e = Editable::from_observable(cell.clone());
        e.begin_edit();
        cell.set(6);
        e.cancel_edit();
        assert_eq!(cell.get(), 5);
    }

    #[test]
    #[tracing_test::traced_test]
    fn transitions_are_traced() {
        let e = Editable::new(0);
        e.begin_edit();
        e.set(1);
        e.cancel_edit();
        assert!(logs_contain("edit.begin"));
        assert!(logs_contain("edit.cancel"));
    }
}
