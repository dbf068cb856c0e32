#![forbid(unsafe_code)]

//! Asynchronous commands with observable state.
//!
//! An [`AsyncCommand`] wraps an action that may complete later. While the
//! action is in flight `is_running` is true and, by default, the command
//! refuses to start again. Failures never propagate to the caller; they set
//! `failed`, may set `fail_message` and run fail handlers.
//!
//! Results travel through [`Deferred`], a single-threaded settle-once cell.
//! Actions may also return any [`Thenable`].
//!
//! ```
//! use statekit_command::{AsyncCommand, Completion, Deferred};
//!
//! let save: AsyncCommand<u32, u32, String> =
//!     AsyncCommand::new(|id| Ok(Completion::Ready(id * 2)));
//! let result = save.execute(21).expect("idle command runs");
//! result.done(|value| assert_eq!(*value, 42));
//! assert!(!save.is_running());
//! assert!(save.completed());
//! # let _: Option<Deferred<u32, String>> = save.pending();
//! ```

pub mod command;
pub mod deferred;
pub mod error;
pub mod options;

pub use command::AsyncCommand;
pub use deferred::{Deferred, State, Thenable};
pub use error::{CommandError, Result};
pub use options::{CommandOptions, Completion, Concurrency, IntoFailMessage};
