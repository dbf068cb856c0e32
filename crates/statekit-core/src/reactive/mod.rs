#![forbid(unsafe_code)]

//! Reactive cells and derived values.
//!
//! - [`Observable`]: a shared, version-tracked value with subscriber
//!   callbacks.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`Computed`]: a lazily evaluated value derived from observables.
//!
//! # Architecture
//!
//! Everything is single-threaded (`Rc<RefCell<..>>`). Writes happen
//! synchronously inside one logical turn; there is no scheduler and no
//! batching.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per notifying write.
//! 2. Subscribers are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op.
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//! 5. `Computed::get()` never returns a stale value.

pub mod computed;
pub mod observable;

pub use computed::Computed;
pub use observable::{Observable, Subscription};
