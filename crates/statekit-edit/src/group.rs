#![forbid(unsafe_code)]

//! Aggregate edit boundaries over many editable children.
//!
//! An [`EditableGroup`] forwards every edit operation to the children it
//! knows about and keeps its own `is_editing` flag. It has no history of its
//! own.
//!
//! # Child discovery
//!
//! Children are registered explicitly, in order:
//!
//! - [`add`](EditableGroup::add): a single node (an [`Editable`] or a nested
//!   group).
//! - [`add_all`](EditableGroup::add_all): a fixed list of nodes.
//! - [`add_list`](EditableGroup::add_list): a cell holding a list of nodes.
//!   Membership is read at the moment each operation runs.
//! - [`add_editable_list`](EditableGroup::add_editable_list): an edit session
//!   over a list of nodes. The list itself is visited first, then whatever
//!   elements it holds afterwards, so cancelling the group first restores the
//!   membership and then cancels the restored elements.
//!
//! An owner type can also describe its children through [`EditableTarget`]
//! and be wrapped with [`EditableGroup::make_editable`].
//!
//! Traversal is one level deep: grandchildren are reached only through a
//! child that forwards to them (a nested group).
//!
//! # Known asymmetry
//!
//! [`undo_cancel`](EditableGroup::undo_cancel) undoes every child and then
//! re-runs the group's own `begin_edit`, which re-checks the gate. If the gate
//! now refuses, children are back in edit mode while the group flag stays
//! false.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use statekit_core::Observable;

use crate::error::{EditError, Result};
use crate::node::EditableNode;
use crate::session::Editable;

type Member = Rc<dyn Fn(&mut dyn FnMut(&dyn EditableNode))>;
type Gate = Rc<dyn Fn() -> bool>;

/// An owner that can enumerate its own editable children.
pub trait EditableTarget {
    /// Call `visit` once per directly owned editable child.
    fn for_each_editable(&self, visit: &mut dyn FnMut(&dyn EditableNode));
}

struct GroupInner {
    is_editing: Observable<bool>,
    gate: RefCell<Option<Gate>>,
    members: RefCell<Vec<Member>>,
}

/// A composite edit boundary.
///
/// Cloning creates another handle to the same group.
#[derive(Clone)]
pub struct EditableGroup {
    inner: Rc<GroupInner>,
}

impl PartialEq for EditableGroup {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for EditableGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditableGroup")
            .field("is_editing", &self.inner.is_editing.get())
            .field("members", &self.inner.members.borrow().len())
            .field("gated", &self.inner.gate.borrow().is_some())
            .finish()
    }
}

impl Default for EditableGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl EditableGroup {
    /// An empty group with no gate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(GroupInner {
                is_editing: Observable::new(false),
                gate: RefCell::new(None),
                members: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Build a group whose children are whatever `target` enumerates at the
    /// time of each operation.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::InvalidArgument`] ("Target must be specified")
    /// when `target` is `None`.
    pub fn make_editable(target: Option<Rc<dyn EditableTarget>>) -> Result<Self> {
        let Some(target) = target else {
            return Err(EditError::missing_target());
        };
        let group = Self::new();
        group.push_member(move |visit| {
            target.for_each_editable(visit);
        });
        Ok(group)
    }

    fn push_member(&self, member: impl Fn(&mut dyn FnMut(&dyn EditableNode)) + 'static) {
        self.inner.members.borrow_mut().push(Rc::new(member));
    }

    /// Register a single child.
    pub fn add<N: EditableNode + 'static>(&self, node: N) -> &Self {
        self.push_member(move |visit| visit(&node));
        self
    }

    /// Register a fixed list of children.
    pub fn add_all<N: EditableNode + 'static>(&self, nodes: Vec<N>) -> &Self {
        self.push_member(move |visit| {
            for node in &nodes {
                visit(node);
            }
        });
        self
    }

    /// Register a cell whose current elements are children.
    pub fn add_list<N>(&self, list: &Observable<Vec<N>>) -> &Self
    where
        N: EditableNode + Clone + PartialEq + 'static,
    {
        let list = list.clone();
        self.push_member(move |visit| {
            for node in &list.get() {
                visit(node);
            }
        });
        self
    }

    /// Register a list that is itself edited, followed by its elements.
    pub fn add_editable_list<N>(&self, list: &Editable<Vec<N>>) -> &Self
    where
        N: EditableNode + Clone + PartialEq + 'static,
    {
        let list = list.clone();
        self.push_member(move |visit| {
            visit(&list);
            for node in &list.get() {
                visit(node);
            }
        });
        self
    }

    /// Install the `is_editable` predicate consulted by `begin_edit`.
    #[must_use]
    pub fn with_gate(self, gate: impl Fn() -> bool + 'static) -> Self {
        self.set_gate(gate);
        self
    }

    pub fn set_gate(&self, gate: impl Fn() -> bool + 'static) {
        self.inner.gate.replace(Some(Rc::new(gate)));
    }

    pub fn clear_gate(&self) {
        self.inner.gate.replace(None);
    }

    /// Whether `begin_edit` would currently take effect.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        let gate = self.inner.gate.borrow().clone();
        gate.is_none_or(|gate| gate())
    }

    /// The group's own editing flag as a cell.
    #[must_use]
    pub fn editing_flag(&self) -> Observable<bool> {
        self.inner.is_editing.clone()
    }

    #[must_use]
    pub fn is_editing(&self) -> bool {
        self.inner.is_editing.get()
    }

    /// Run `action` on every child currently discovered, in registration
    /// order.
    pub fn for_each_child(&self, mut action: impl FnMut(&dyn EditableNode)) {
        // Snapshot so children may register more members while we iterate.
        let members: Vec<Member> = self.inner.members.borrow().clone();
        for member in members {
            member(&mut action);
        }
    }

    /// Number of children an operation would reach right now.
    #[must_use]
    pub fn child_count(&self) -> usize {
        let mut count = 0;
        self.for_each_child(|_| count += 1);
        count
    }

    pub fn begin_edit(&self) {
        if !self.is_editable() {
            tracing::debug!(message = "group.begin.refused");
            return;
        }
        self.for_each_child(|child| child.begin_edit());
        tracing::debug!(message = "group.begin");
        self.inner.is_editing.set(true);
    }

    pub fn end_edit(&self) {
        self.for_each_child(|child| child.end_edit());
        tracing::debug!(message = "group.end");
        self.inner.is_editing.set(false);
    }

    pub fn cancel_edit(&self) {
        self.for_each_child(|child| child.cancel_edit());
        tracing::debug!(message = "group.cancel");
        self.inner.is_editing.set(false);
    }

    pub fn rollback(&self) {
        self.for_each_child(|child| child.rollback());
        tracing::debug!(message = "group.rollback");
    }

    pub fn undo_cancel(&self) {
        self.for_each_child(|child| child.undo_cancel());
        tracing::debug!(message = "group.undo_cancel");
        self.begin_edit();
    }

    /// Whether any child holds an uncommitted change.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        let mut dirty = false;
        self.for_each_child(|child| dirty = dirty || child.is_dirty());
        dirty
    }
}

impl EditableNode for EditableGroup {
    fn begin_edit(&self) {
        EditableGroup::begin_edit(self);
    }

    fn end_edit(&self) {
        EditableGroup::end_edit(self);
    }

    fn cancel_edit(&self) {
        EditableGroup::cancel_edit(self);
    }

    fn undo_cancel(&self) {
        EditableGroup::undo_cancel(self);
    }

    fn rollback(&self) {
        EditableGroup::rollback(self);
    }

    fn is_editing(&self) -> bool {
        EditableGroup::is_editing(self)
    }

    fn is_dirty(&self) -> bool {
        EditableGroup::is_dirty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn missing_target_is_rejected() {
        let err = EditableGroup::make_editable(None).unwrap_err();
        assert_eq!(err.to_string(), "Target must be specified");
    }

    #[test]
    fn flag_transitions_without_children() {
        let group = EditableGroup::new();
        assert!(!group.is_editing());

        group.end_edit();
        group.cancel_edit();
        assert!(!group.is_editing());

        group.begin_edit();
        group.begin_edit();
        assert!(group.is_editing());

        group.end_edit();
        assert!(!group.is_editing());

        group.begin_edit();
        group.cancel_edit();
        assert!(!group.is_editing());

        group.undo_cancel();
        assert!(group.is_editing());
    }

    #[test]
    fn refused_gate_skips_every_child() {
        let a = Editable::new(1);
        let b = Editable::new(2);
        let group = EditableGroup::new().with_gate(|| false);
        group.add(a.clone()).add(b.clone());

        group.begin_edit();
        assert!(!group.is_editing());
        assert!(!a.is_editing());
        assert!(!b.is_editing());
        assert_eq!(a.history_len(), 0);
    }

    #[test]
    fn undo_cancel_with_closed_gate_leaves_group_flag_false() {
        let open = Rc::new(Cell::new(true));
        let gate = Rc::clone(&open);
        let child = Editable::new("initial");
        let group = EditableGroup::new().with_gate(move || gate.get());
        group.add(child.clone());

        group.begin_edit();
        child.set("changed");
        group.cancel_edit();

        open.set(false);
        group.undo_cancel();

        // Child re-entered edit mode through its own undo; the group did not.
        assert!(child.is_editing());
        assert_eq!(child.get(), "changed");
        assert!(!group.is_editing());
    }

    #[test]
    fn dirty_if_any_child_dirty() {
        let a = Editable::new(1);
        let b = Editable::new(2);
        let group = EditableGroup::new();
        group.add(a.clone()).add(b.clone());

        group.begin_edit();
        assert!(!group.is_dirty());
        b.set(3);
        assert!(group.is_dirty());
        group.end_edit();
        assert!(!group.is_dirty());
    }

    #[test]
    fn nested_groups_forward() {
        let leaf = Editable::new(0);
        let inner = EditableGroup::new();
        inner.add(leaf.clone());
        let outer = EditableGroup::new();
        outer.add(inner.clone());

        outer.begin_edit();
        assert!(inner.is_editing());
        assert!(leaf.is_editing());
        leaf.set(5);
        outer.cancel_edit();
        assert_eq!(leaf.get(), 0);
        assert!(!inner.is_editing());
    }

    #[test]
    fn add_list_reads_current_membership() {
        let a = Editable::new(1);
        let b = Editable::new(2);
        let list = Observable::new(vec![a.clone()]);
        let group = EditableGroup::new();
        group.add_list(&list);

        group.begin_edit();
        assert!(a.is_editing());

        // Joining mid-edit does not retroactively begin an edit.
        list.update(|items| items.push(b.clone()));
        assert!(!b.is_editing());
        assert_eq!(group.child_count(), 2);

        group.cancel_edit();
        assert!(!a.is_editing());
        assert!(!b.is_editing());
    }

    #[test]
    #[tracing_test::traced_test]
    fn refused_begin_is_traced() {
        let group = EditableGroup::new().with_gate(|| false);
        group.begin_edit();
        assert!(logs_contain("group.begin.refused"));
    }
}
