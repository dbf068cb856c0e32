#![forbid(unsafe_code)]

//! Single-threaded settle-once results.
//!
//! A [`Deferred<T, E>`] starts pending and is settled exactly once, either
//! resolved with a `T` or rejected with an `E`. Continuations registered
//! before settlement run in registration order when it happens; continuations
//! registered afterwards run immediately.
//!
//! # Invariants
//!
//! 1. The first `resolve`/`reject` wins; later calls are no-ops.
//! 2. Each continuation runs at most once.
//! 3. Continuations run with no internal borrow held, so they may register
//!    more continuations or settle other deferreds.
//!
//! # Abort
//!
//! A pending deferred may carry an abort hook. [`abort`](Deferred::abort)
//! runs it once; the hook decides whether to reject. Settling drops the hook.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Settlement state of a [`Deferred`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Resolved,
    Rejected,
}

enum Outcome<T, E> {
    Pending,
    Resolved(Rc<T>),
    Rejected(Rc<E>),
}

impl<T, E> Clone for Outcome<T, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Pending => Self::Pending,
            Self::Resolved(value) => Self::Resolved(Rc::clone(value)),
            Self::Rejected(error) => Self::Rejected(Rc::clone(error)),
        }
    }
}

type DoneFn<T> = Box<dyn FnOnce(&T)>;
type FailFn<E> = Box<dyn FnOnce(&E)>;
type AlwaysFn<T, E> = Box<dyn FnOnce(Result<&T, &E>)>;

enum Continuation<T, E> {
    Done(DoneFn<T>),
    Fail(FailFn<E>),
    Always(AlwaysFn<T, E>),
}

impl<T, E> Continuation<T, E> {
    fn run(self, outcome: &Outcome<T, E>) {
        match (self, outcome) {
            (Self::Done(f), Outcome::Resolved(value)) => f(&**value),
            (Self::Fail(f), Outcome::Rejected(error)) => f(&**error),
            (Self::Always(f), Outcome::Resolved(value)) => f(Ok(&**value)),
            (Self::Always(f), Outcome::Rejected(error)) => f(Err(&**error)),
            _ => {}
        }
    }
}

struct DeferredInner<T, E> {
    outcome: Outcome<T, E>,
    continuations: Vec<Continuation<T, E>>,
    abort: Option<Box<dyn FnOnce()>>,
}

/// A shared, settle-once result.
///
/// Cloning creates another handle to the same result.
pub struct Deferred<T, E> {
    inner: Rc<RefCell<DeferredInner<T, E>>>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, E> PartialEq for Deferred<T, E> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        let mut out = f.debug_struct("Deferred");
        match &inner.outcome {
            Outcome::Pending => out.field("state", &State::Pending),
            Outcome::Resolved(value) => out.field("resolved", value),
            Outcome::Rejected(error) => out.field("rejected", error),
        };
        out.field("continuations", &inner.continuations.len())
            .field("abortable", &inner.abort.is_some())
            .finish()
    }
}

impl<T: 'static, E: 'static> Default for Deferred<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static, E: 'static> Deferred<T, E> {
    /// A pending deferred.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(DeferredInner {
                outcome: Outcome::Pending,
                continuations: Vec::new(),
                abort: None,
            })),
        }
    }

    /// An already resolved deferred.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        let deferred = Self::new();
        deferred.resolve(value);
        deferred
    }

    /// An already rejected deferred.
    #[must_use]
    pub fn rejected(error: E) -> Self {
        let deferred = Self::new();
        deferred.reject(error);
        deferred
    }

    /// Attach an abort hook, replacing any earlier one.
    #[must_use]
    pub fn with_abort(self, hook: impl FnOnce() + 'static) -> Self {
        self.on_abort(hook);
        self
    }

    /// Attach an abort hook to a pending deferred. Ignored once settled.
    pub fn on_abort(&self, hook: impl FnOnce() + 'static) -> &Self {
        let mut inner = self.inner.borrow_mut();
        if matches!(inner.outcome, Outcome::Pending) {
            inner.abort = Some(Box::new(hook));
        }
        self
    }

    /// Run the abort hook if one is attached. Returns whether a hook ran.
    pub fn abort(&self) -> bool {
        let hook = self.inner.borrow_mut().abort.take();
        match hook {
            Some(hook) => {
                tracing::debug!(message = "deferred.abort");
                hook();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn can_abort(&self) -> bool {
        self.inner.borrow().abort.is_some()
    }

    pub fn resolve(&self, value: T) {
        self.settle(Outcome::Resolved(Rc::new(value)));
    }

    pub fn reject(&self, error: E) {
        self.settle(Outcome::Rejected(Rc::new(error)));
    }

    fn settle(&self, outcome: Outcome<T, E>) {
        let (continuations, hook) = {
            let mut inner = self.inner.borrow_mut();
            if !matches!(inner.outcome, Outcome::Pending) {
                return;
            }
            inner.outcome = outcome.clone();
            (std::mem::take(&mut inner.continuations), inner.abort.take())
        };
        drop(hook);
        for continuation in continuations {
            continuation.run(&outcome);
        }
    }

    fn attach(&self, continuation: Continuation<T, E>) -> &Self {
        let outcome = {
            let mut inner = self.inner.borrow_mut();
            if matches!(inner.outcome, Outcome::Pending) {
                inner.continuations.push(continuation);
                return self;
            }
            inner.outcome.clone()
        };
        continuation.run(&outcome);
        self
    }

    /// Run `f` with the value once resolved.
    pub fn done(&self, f: impl FnOnce(&T) + 'static) -> &Self {
        self.attach(Continuation::Done(Box::new(f)))
    }

    /// Run `f` with the error once rejected.
    pub fn fail(&self, f: impl FnOnce(&E) + 'static) -> &Self {
        self.attach(Continuation::Fail(Box::new(f)))
    }

    /// Run `f` with the outcome once settled either way.
    pub fn always(&self, f: impl FnOnce(Result<&T, &E>) + 'static) -> &Self {
        self.attach(Continuation::Always(Box::new(f)))
    }

    /// Register a success and a failure continuation at once.
    pub fn then(
        &self,
        on_done: impl FnOnce(&T) + 'static,
        on_fail: impl FnOnce(&E) + 'static,
    ) -> &Self {
        self.done(on_done).fail(on_fail)
    }

    #[must_use]
    pub fn state(&self) -> State {
        match self.inner.borrow().outcome {
            Outcome::Pending => State::Pending,
            Outcome::Resolved(_) => State::Resolved,
            Outcome::Rejected(_) => State::Rejected,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }
}

/// Anything that reports completion through continuations.
///
/// Implement this for a foreign async handle to return it from a command
/// action. Exactly one of the two callbacks must eventually run, at most
/// once.
pub trait Thenable<T, E> {
    fn on_settle(&self, on_done: Box<dyn FnOnce(&T)>, on_fail: Box<dyn FnOnce(&E)>);

    /// Request cancellation. Returns whether the request was delivered.
    fn abort(&self) -> bool {
        false
    }
}

impl<T: 'static, E: 'static> Thenable<T, E> for Deferred<T, E> {
    fn on_settle(&self, on_done: Box<dyn FnOnce(&T)>, on_fail: Box<dyn FnOnce(&E)>) {
        self.then(on_done, on_fail);
    }

    fn abort(&self) -> bool {
        Deferred::abort(self)
    }
}
