#![forbid(unsafe_code)]

//! Edit sessions: begin/end/cancel transactions with rollback history over
//! single values, and groups that apply them across many values at once.

pub mod error;
pub mod group;
pub mod node;
pub mod session;

pub use error::{EditError, Result};
pub use group::{EditableGroup, EditableTarget};
pub use node::EditableNode;
pub use session::{Editable, EditableVec};
