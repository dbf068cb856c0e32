#![forbid(unsafe_code)]

//! The object-safe edit surface shared by single values and groups.

/// Anything that can take part in an edit transaction.
///
/// Every operation is permissive: calling it in a state where it does not
/// apply (ending an edit that never began, undoing a cancel that never
/// happened) is a silent no-op, never an error.
///
/// All methods take `&self`; implementors are shared handles with interior
/// mutability, so a group can hold the same node its owner holds.
pub trait EditableNode {
    /// Open an edit, snapshotting the current value.
    fn begin_edit(&self);

    /// Commit the open edit.
    fn end_edit(&self);

    /// Discard the open edit, restoring the snapshot.
    fn cancel_edit(&self);

    /// Re-apply the most recently cancelled edit and reopen it.
    fn undo_cancel(&self);

    /// Step back one committed snapshot.
    fn rollback(&self);

    /// Whether an edit is open.
    fn is_editing(&self) -> bool;

    /// Whether the open edit differs from its snapshot.
    fn is_dirty(&self) -> bool;
}
