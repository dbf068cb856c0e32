#![forbid(unsafe_code)]

//! Command configuration.

use std::fmt;
use std::rc::Rc;

use crate::deferred::{Deferred, Thenable};

/// What an action hands back: a value available now, or an operation that
/// settles later.
pub enum Completion<T, E> {
    Ready(T),
    Pending(Rc<dyn Thenable<T, E>>),
}

impl<T: 'static, E: 'static> Completion<T, E> {
    #[must_use]
    pub fn ready(value: T) -> Self {
        Self::Ready(value)
    }

    /// Wrap any [`Thenable`].
    #[must_use]
    pub fn thenable(operation: impl Thenable<T, E> + 'static) -> Self {
        Self::Pending(Rc::new(operation))
    }
}

impl<T: 'static, E: 'static> From<Deferred<T, E>> for Completion<T, E> {
    fn from(deferred: Deferred<T, E>) -> Self {
        Self::Pending(Rc::new(deferred))
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Completion<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// Return value of a fail handler that may set the command's fail message.
///
/// `()` leaves the message alone; empty text does too.
pub trait IntoFailMessage {
    fn into_fail_message(self) -> Option<String>;
}

impl IntoFailMessage for () {
    fn into_fail_message(self) -> Option<String> {
        None
    }
}

impl IntoFailMessage for String {
    fn into_fail_message(self) -> Option<String> {
        (!self.is_empty()).then_some(self)
    }
}

impl IntoFailMessage for &str {
    fn into_fail_message(self) -> Option<String> {
        self.to_owned().into_fail_message()
    }
}

impl<M: IntoFailMessage> IntoFailMessage for Option<M> {
    fn into_fail_message(self) -> Option<String> {
        self.and_then(IntoFailMessage::into_fail_message)
    }
}

/// Behaviour of `execute` while an earlier operation is still running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Concurrency {
    /// Refuse to start until the running operation settles.
    #[default]
    Block,
    /// Abort the running operation, if it can be aborted, and start anyway.
    AbortPending,
}

pub(crate) type Action<A, T, E> = Rc<dyn Fn(A) -> Result<Completion<T, E>, E>>;
pub(crate) type Predicate = Rc<dyn Fn() -> bool>;
pub(crate) type DoneHandler<T> = Rc<dyn Fn(&T)>;
pub(crate) type FailHandler<E> = Rc<dyn Fn(&E) -> Option<String>>;
pub(crate) type AlwaysHandler<T, E> = Rc<dyn Fn(Result<&T, &E>)>;

/// Construction options for an [`AsyncCommand`](crate::AsyncCommand).
///
/// Only `action` is required. A bare closure converts into options with just
/// an action.
pub struct CommandOptions<A, T, E> {
    pub(crate) action: Option<Action<A, T, E>>,
    pub(crate) can_execute: Option<Predicate>,
    pub(crate) done: Option<DoneHandler<T>>,
    pub(crate) fail: Option<FailHandler<E>>,
    pub(crate) concurrency: Concurrency,
}

impl<A, T, E> Default for CommandOptions<A, T, E> {
    fn default() -> Self {
        Self {
            action: None,
            can_execute: None,
            done: None,
            fail: None,
            concurrency: Concurrency::default(),
        }
    }
}

impl<A, T, E> fmt::Debug for CommandOptions<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandOptions")
            .field("action", &self.action.is_some())
            .field("can_execute", &self.can_execute.is_some())
            .field("done", &self.done.is_some())
            .field("fail", &self.fail.is_some())
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl<A: 'static, T: 'static, E: 'static> CommandOptions<A, T, E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_action(
        mut self,
        action: impl Fn(A) -> Result<Completion<T, E>, E> + 'static,
    ) -> Self {
        self.action = Some(Rc::new(action));
        self
    }

    #[must_use]
    pub fn with_can_execute(mut self, predicate: impl Fn() -> bool + 'static) -> Self {
        self.can_execute = Some(Rc::new(predicate));
        self
    }

    #[must_use]
    pub fn with_done(mut self, handler: impl Fn(&T) + 'static) -> Self {
        self.done = Some(Rc::new(handler));
        self
    }

    #[must_use]
    pub fn with_fail<M: IntoFailMessage>(mut self, handler: impl Fn(&E) -> M + 'static) -> Self {
        self.fail = Some(Rc::new(move |error: &E| handler(error).into_fail_message()));
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }
}

impl<A, T, E, F> From<F> for CommandOptions<A, T, E>
where
    A: 'static,
    T: 'static,
    E: 'static,
    F: Fn(A) -> Result<Completion<T, E>, E> + 'static,
{
    fn from(action: F) -> Self {
        Self::new().with_action(action)
    }
}
