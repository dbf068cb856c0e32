#![forbid(unsafe_code)]

//! Live sorting of observable lists.
//!
//! A [`SortedView`] keeps an `Observable<Vec<T>>` ordered by a comma-separated
//! list of dotted key paths. Reactive cells met along a path are tracked, so
//! writes deep inside an element resort the list too.
//!
//! ```
//! use statekit_core::Observable;
//! use statekit_sort::{SortOptions, SortedView, Value};
//!
//! let people = Observable::new(vec![
//!     Value::record([("name", "Brel")]),
//!     Value::record([("name", "adams")]),
//! ]);
//! let view = SortedView::new(&people, SortOptions::new().with_key("name"));
//! assert_eq!(people.get()[0].field("name"), Value::from("adams"));
//!
//! view.set_sort_key("name");
//! assert!(view.is_descending());
//! assert_eq!(people.get()[0].field("name"), Value::from("Brel"));
//! ```

pub mod collate;
pub mod compare;
pub mod options;
pub mod value;
pub mod view;

pub use collate::{BaseCollator, Collator};
pub use compare::Comparator;
pub use options::SortOptions;
pub use value::{Keyed, LENGTH, ReactiveSource, Value};
pub use view::SortedView;
