#![forbid(unsafe_code)]

//! Observable state machine around an asynchronous action.
//!
//! ```text
//!            execute (can_execute)
//!   Idle ──────────────────────────▶ Running
//!    ▲                                  │ settle
//!    └──── Succeeded │ Failed ◀─────────┘
//! ```
//!
//! # Settlement order
//!
//! When the operation settles the command runs, in order:
//!
//! 1. `always` handlers, led by the internal one that clears `is_running` and
//!    sets `completed`,
//! 2. `fail` handlers on failure, led by the internal one that sets `failed`;
//!    a handler returning non-empty text replaces `fail_message`,
//! 3. `done` handlers on success.
//!
//! Continuations chained on the returned [`Deferred`] run after these.
//!
//! # Invariants
//!
//! 1. The action never runs while `can_execute` is false.
//! 2. Handler lists are snapshotted at `execute`; handlers registered while
//!    an operation is in flight apply from the next `execute`.
//! 3. Once a newer operation has started, an older one no longer moves the
//!    status cells. It still runs its handlers when it settles.
//!
//! # Failure Modes
//!
//! - **Action returns `Err`**: treated exactly like a rejection; nothing is
//!   propagated to the caller of `execute`.
//! - **Pending operation cannot abort**: `AbortPending` starts the new
//!   operation anyway; the old one settles on its own.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use statekit_core::{Computed, Observable};

use crate::deferred::Deferred;
use crate::error::{CommandError, Result};
use crate::options::{
    Action, AlwaysHandler, CommandOptions, Completion, Concurrency, DoneHandler, FailHandler,
    IntoFailMessage, Predicate,
};

struct Handlers<T, E> {
    done: Vec<DoneHandler<T>>,
    fail: Vec<FailHandler<E>>,
    always: Vec<AlwaysHandler<T, E>>,
}

impl<T, E> Clone for Handlers<T, E> {
    fn clone(&self) -> Self {
        Self {
            done: self.done.clone(),
            fail: self.fail.clone(),
            always: self.always.clone(),
        }
    }
}

struct CommandInner<A, T, E> {
    action: Action<A, T, E>,
    concurrency: Concurrency,
    is_running: Observable<bool>,
    failed: Observable<bool>,
    fail_message: Observable<String>,
    completed: Observable<bool>,
    refresh: Observable<u64>,
    can_execute: Computed<bool>,
    handlers: RefCell<Handlers<T, E>>,
    pending: RefCell<Option<Deferred<T, E>>>,
    generation: Cell<u64>,
}

/// An invocable action with observable running/failed state.
///
/// Values and errors handed over by a pending operation are cloned into the
/// returned [`Deferred`]. Cloning the command creates another handle to the
/// same command.
pub struct AsyncCommand<A = (), T = (), E = String> {
    inner: Rc<CommandInner<A, T, E>>,
}

impl<A, T, E> Clone for AsyncCommand<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A, T, E> fmt::Debug for AsyncCommand<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = &self.inner;
        f.debug_struct("AsyncCommand")
            .field("is_running", &inner.is_running.get())
            .field("failed", &inner.failed.get())
            .field("fail_message", &inner.fail_message.get())
            .field("completed", &inner.completed.get())
            .field("concurrency", &inner.concurrency)
            .field("generation", &inner.generation.get())
            .finish()
    }
}

impl<A, T, E> AsyncCommand<A, T, E>
where
    A: 'static,
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Build a command from options.
    ///
    /// # Errors
    ///
    /// [`CommandError::MissingOptions`] when `options` is `None`, and
    /// [`CommandError::MissingAction`] when it carries no action.
    pub fn try_new(options: Option<CommandOptions<A, T, E>>) -> Result<Self> {
        let mut options = options.ok_or(CommandError::MissingOptions)?;
        let action = options.action.take().ok_or(CommandError::MissingAction)?;
        Ok(Self::build(action, options))
    }

    /// Build a command around `action` with default options.
    #[must_use]
    pub fn new(action: impl Fn(A) -> std::result::Result<Completion<T, E>, E> + 'static) -> Self {
        let action: Action<A, T, E> = Rc::new(action);
        Self::build(action, CommandOptions::new())
    }

    fn build(action: Action<A, T, E>, options: CommandOptions<A, T, E>) -> Self {
        let is_running = Observable::new(false);
        let refresh = Observable::new(0u64);
        let can_execute = Self::can_execute_flag(
            &is_running,
            &refresh,
            options.concurrency,
            options.can_execute,
        );

        let handlers = Handlers {
            done: options.done.into_iter().collect(),
            fail: options.fail.into_iter().collect(),
            always: Vec::new(),
        };

        Self {
            inner: Rc::new(CommandInner {
                action,
                concurrency: options.concurrency,
                is_running,
                failed: Observable::new(false),
                fail_message: Observable::new(String::new()),
                completed: Observable::new(false),
                refresh,
                can_execute,
                handlers: RefCell::new(handlers),
                pending: RefCell::new(None),
                generation: Cell::new(0),
            }),
        }
    }

    fn can_execute_flag(
        is_running: &Observable<bool>,
        refresh: &Observable<u64>,
        concurrency: Concurrency,
        predicate: Option<Predicate>,
    ) -> Computed<bool> {
        Computed::from2(is_running, refresh, move |running, _| {
            (!*running || concurrency == Concurrency::AbortPending)
                && predicate.as_ref().is_none_or(|allowed| allowed())
        })
    }

    /// Start the action with `args`.
    ///
    /// The returned deferred settles with the action's outcome.
    ///
    /// # Errors
    ///
    /// [`CommandError::CannotExecute`] when `can_execute` is false. The action
    /// is not called, `is_running` is untouched and no command-level handler
    /// runs.
    pub fn execute(&self, args: A) -> Result<Deferred<T, E>> {
        if self.inner.concurrency == Concurrency::AbortPending {
            self.abort_pending();
        }

        if !self.can_execute() {
            tracing::debug!(message = "command.refused");
            return Err(CommandError::CannotExecute);
        }

        let inner = &self.inner;
        let generation = inner.generation.get() + 1;
        inner.generation.set(generation);
        inner.is_running.set(true);
        inner.failed.set(false);
        inner.fail_message.set(String::new());
        tracing::debug!(message = "command.execute", generation);

        let result: Deferred<T, E> = Deferred::new();
        self.attach_handlers(&result, generation);
        inner.pending.replace(Some(result.clone()));

        match (inner.action)(args) {
            Ok(Completion::Ready(value)) => result.resolve(value),
            Err(error) => result.reject(error),
            Ok(Completion::Pending(operation)) => {
                let (on_done, on_fail) = (result.clone(), result.clone());
                let abortable = Rc::clone(&operation);
                result.on_abort(move || {
                    abortable.abort();
                });
                operation.on_settle(
                    Box::new(move |value: &T| on_done.resolve(value.clone())),
                    Box::new(move |error: &E| on_fail.reject(error.clone())),
                );
            }
        }
        Ok(result)
    }

    fn attach_handlers(&self, result: &Deferred<T, E>, generation: u64) {
        let handlers = self.inner.handlers.borrow().clone();
        let weak: Weak<CommandInner<A, T, E>> = Rc::downgrade(&self.inner);

        let always_weak = weak.clone();
        let always = handlers.always;
        result.always(move |outcome| {
            let current = always_weak.upgrade().filter(|inner| inner.generation.get() == generation);
            if let Some(inner) = &current {
                inner.pending.replace(None);
                inner.is_running.set(false);
                inner.completed.set(true);
                tracing::debug!(message = "command.settled", generation, ok = outcome.is_ok());
            } else {
                tracing::debug!(message = "command.settled.stale", generation);
            }
            for handler in &always {
                handler(outcome);
            }
        });

        let fail = handlers.fail;
        result.fail(move |error| {
            let current = weak.upgrade().filter(|inner| inner.generation.get() == generation);
            if let Some(inner) = &current {
                inner.failed.set(true);
            }
            for handler in &fail {
                let message = handler(error);
                if let (Some(inner), Some(message)) = (&current, message) {
                    inner.fail_message.set(message);
                }
            }
        });

        let done = handlers.done;
        result.done(move |value| {
            for handler in &done {
                handler(value);
            }
        });
    }

    /// Abort the in-flight operation if it supports abort.
    ///
    /// Returns whether an abort request was delivered.
    pub fn abort_pending(&self) -> bool {
        let pending = self.inner.pending.borrow().clone();
        match pending {
            Some(operation) if operation.is_pending() => {
                let aborted = operation.abort();
                tracing::debug!(message = "command.abort", aborted);
                aborted
            }
            _ => false,
        }
    }

    /// Whether `execute` would run the action right now.
    #[must_use]
    pub fn can_execute(&self) -> bool {
        self.inner.can_execute.invalidate();
        self.inner.can_execute.get()
    }

    /// The live `can_execute` value for binding adapters.
    ///
    /// It tracks `is_running`; changes in state read by the predicate are
    /// picked up after [`can_execute_has_mutated`](Self::can_execute_has_mutated).
    #[must_use]
    pub fn can_execute_flag_cell(&self) -> Computed<bool> {
        self.inner.can_execute.clone()
    }

    /// Tell the command that state read by its predicate has changed.
    pub fn can_execute_has_mutated(&self) {
        let tick = self.inner.refresh.get().wrapping_add(1);
        self.inner.refresh.set(tick);
    }

    /// Register a success handler. Applies from the next `execute`.
    pub fn done(&self, handler: impl Fn(&T) + 'static) -> &Self {
        self.inner.handlers.borrow_mut().done.push(Rc::new(handler));
        self
    }

    /// Register a failure handler. Non-empty text it returns becomes the fail
    /// message.
    pub fn fail<M: IntoFailMessage>(&self, handler: impl Fn(&E) -> M + 'static) -> &Self {
        self.inner
            .handlers
            .borrow_mut()
            .fail
            .push(Rc::new(move |error: &E| handler(error).into_fail_message()));
        self
    }

    /// Register a handler that runs on either outcome.
    pub fn always(&self, handler: impl Fn(std::result::Result<&T, &E>) + 'static) -> &Self {
        self.inner
            .handlers
            .borrow_mut()
            .always
            .push(Rc::new(handler));
        self
    }

    /// Register a success and a failure handler at once.
    pub fn then<M: IntoFailMessage>(
        &self,
        on_done: impl Fn(&T) + 'static,
        on_fail: impl Fn(&E) -> M + 'static,
    ) -> &Self {
        self.done(on_done).fail(on_fail)
    }

    /// Return `is_running`, `failed` and `fail_message` to their initial
    /// values. `completed` and any in-flight operation are left alone.
    pub fn reset(&self) {
        self.inner.is_running.set(false);
        self.inner.failed.set(false);
        self.inner.fail_message.set(String::new());
        tracing::debug!(message = "command.reset");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.is_running.get()
    }

    #[must_use]
    pub fn failed(&self) -> bool {
        self.inner.failed.get()
    }

    #[must_use]
    pub fn fail_message(&self) -> String {
        self.inner.fail_message.get()
    }

    #[must_use]
    pub fn completed(&self) -> bool {
        self.inner.completed.get()
    }

    /// The running flag as a writable cell.
    #[must_use]
    pub fn running_flag(&self) -> Observable<bool> {
        self.inner.is_running.clone()
    }

    /// The failed flag as a writable cell.
    #[must_use]
    pub fn failed_flag(&self) -> Observable<bool> {
        self.inner.failed.clone()
    }

    /// The fail message as a writable cell.
    #[must_use]
    pub fn fail_message_cell(&self) -> Observable<String> {
        self.inner.fail_message.clone()
    }

    #[must_use]
    pub fn completed_flag(&self) -> Observable<bool> {
        self.inner.completed.clone()
    }

    /// The operation started by the most recent `execute`, while it is in
    /// flight.
    #[must_use]
    pub fn pending(&self) -> Option<Deferred<T, E>> {
        self.inner.pending.borrow().clone()
    }

    #[must_use]
    pub fn concurrency(&self) -> Concurrency {
        self.inner.concurrency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_command(
        slot: &Rc<RefCell<Option<Deferred<(), String>>>>,
    ) -> AsyncCommand<(), (), String> {
        let slot = Rc::clone(slot);
        AsyncCommand::new(move |()| {
            let deferred = Deferred::new();
            slot.replace(Some(deferred.clone()));
            Ok(deferred.into())
        })
    }

    #[test]
    fn missing_options_and_action_are_rejected() {
        let err = AsyncCommand::<(), (), String>::try_new(None).unwrap_err();
        assert_eq!(err, CommandError::MissingOptions);
        let err = AsyncCommand::<(), (), String>::try_new(Some(CommandOptions::new())).unwrap_err();
        assert_eq!(err, CommandError::MissingAction);
    }

    #[test]
    fn initial_state() {
        let command: AsyncCommand = AsyncCommand::new(|()| Ok(Completion::Ready(())));
        assert!(!command.is_running());
        assert!(!command.failed());
        assert_eq!(command.fail_message(), "");
        assert!(!command.completed());
        assert!(command.can_execute());
        assert!(command.pending().is_none());
    }

    #[test]
    fn running_blocks_can_execute() {
        let slot = Rc::new(RefCell::new(None));
        let command = pending_command(&slot);

        let result = command.execute(()).expect("idle command runs");
        assert!(command.is_running());
        assert!(!command.can_execute());
        assert_eq!(command.execute(()), Err(CommandError::CannotExecute));

        slot.borrow().as_ref().expect("action ran").resolve(());
        assert!(!command.is_running());
        assert!(command.can_execute());
        assert!(!result.is_pending());
        assert!(command.pending().is_none());
    }

    #[test]
    fn abort_pending_mode_replaces_running_operation() {
        let aborted = Rc::new(Cell::new(0));
        let counter = Rc::clone(&aborted);
        let command: AsyncCommand<(), (), String> = AsyncCommand::try_new(Some(
            CommandOptions::new()
                .with_action(move |()| {
                    let counter = Rc::clone(&counter);
                    let deferred: Deferred<(), String> = Deferred::new();
                    let handle = deferred.clone();
                    deferred.on_abort(move || {
                        counter.set(counter.get() + 1);
                        handle.reject("aborted".to_owned());
                    });
                    Ok(deferred.into())
                })
                .with_concurrency(Concurrency::AbortPending),
        ))
        .expect("options carry an action");

        let first = command.execute(()).expect("first run");
        assert!(command.can_execute());
        let second = command.execute(()).expect("abort mode always runs");

        assert_eq!(aborted.get(), 1);
        assert_eq!(first.state(), crate::State::Rejected);
        assert!(second.is_pending());
        // The aborted run's failure was cleared when the new run started.
        assert!(command.is_running());
        assert!(!command.failed());
        assert_eq!(command.pending(), Some(second));
    }

    #[test]
    #[tracing_test::traced_test]
    fn superseded_operation_leaves_status_alone() {
        let slot = Rc::new(RefCell::new(None));
        let command = pending_command(&slot);
        let handled = Rc::new(Cell::new(0));
        let counter = Rc::clone(&handled);
        command.fail(move |_: &String| {
            counter.set(counter.get() + 1);
            "stale failure"
        });

        command.execute(()).expect("idle command runs");
        let first = slot.borrow_mut().take().expect("first action ran");
        command.reset();
        command.execute(()).expect("reset command runs");
        let second = slot.borrow_mut().take().expect("second action ran");

        first.reject("late".to_owned());
        assert_eq!(handled.get(), 1);
        assert!(command.is_running());
        assert!(!command.failed());
        assert_eq!(command.fail_message(), "");
        assert!(!command.completed());
        assert_eq!(command.pending(), Some(second.clone()));
        assert!(logs_contain("command.settled.stale"));

        second.resolve(());
        assert!(!command.is_running());
        assert!(!command.failed());
        assert!(command.completed());
        assert!(command.pending().is_none());
    }

    #[test]
    #[tracing_test::traced_test]
    fn refusal_is_traced() {
        let command: AsyncCommand = AsyncCommand::try_new(Some(
            CommandOptions::new()
                .with_action(|()| Ok(Completion::Ready(())))
                .with_can_execute(|| false),
        ))
        .expect("options carry an action");
        assert!(command.execute(()).is_err());
        assert!(logs_contain("command.refused"));
    }
}
