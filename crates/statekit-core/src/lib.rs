#![forbid(unsafe_code)]

//! Core: the reactive substrate shared by every statekit component.

pub mod reactive;

pub use reactive::{Computed, Observable, Subscription};
