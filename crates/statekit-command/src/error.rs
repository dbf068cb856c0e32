#![forbid(unsafe_code)]

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CommandError>;

/// Errors raised by command construction and invocation.
///
/// Failures of the action itself are never reported here; they settle the
/// returned [`Deferred`](crate::Deferred) as rejected instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("No options were specified")]
    MissingOptions,

    #[error("No action was specified in the options")]
    MissingAction,

    /// `execute` was called while `can_execute` was false. The action did not
    /// run and no command-level handler was invoked.
    #[error("command cannot execute")]
    CannotExecute,
}
