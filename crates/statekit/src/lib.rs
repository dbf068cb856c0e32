#![forbid(unsafe_code)]

//! statekit public facade crate.
//!
//! Observable state for view models: edit sessions with rollback, grouped
//! edit boundaries, live-sorted lists and asynchronous commands, all built on
//! the single-threaded cells in [`core`].

pub use statekit_core as core;
#[cfg(feature = "command")]
pub use statekit_command as command;
#[cfg(feature = "edit")]
pub use statekit_edit as edit;
#[cfg(feature = "sort")]
pub use statekit_sort as sort;

pub mod prelude {
    pub use statekit_core::{Computed, Observable, Subscription};

    #[cfg(feature = "command")]
    pub use statekit_command::{
        AsyncCommand, CommandError, CommandOptions, Completion, Concurrency, Deferred, Thenable,
    };
    #[cfg(feature = "edit")]
    pub use statekit_edit::{
        EditError, Editable, EditableGroup, EditableNode, EditableTarget, EditableVec,
    };
    #[cfg(feature = "sort")]
    pub use statekit_sort::{BaseCollator, Collator, Keyed, SortOptions, SortedView, Value};
}
