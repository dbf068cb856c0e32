#![forbid(unsafe_code)]

//! Dynamic values reachable through sort key paths.
//!
//! A key path such as `nested.name.length` walks from a list element through
//! named fields. Each step yields a [`Value`]; a [`Value::Cell`] step is a
//! reactive source that the sorter reads *and* subscribes to, so a later
//! write anywhere along the path triggers a resort.
//!
//! Element types describe themselves through [`Keyed`]. [`Value`] implements
//! it for ad-hoc records; domain structs implement it by hand.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use statekit_core::{Observable, Subscription};

/// Pseudo-field available on text and lists.
pub const LENGTH: &str = "length";

/// A reactive step along a key path.
pub trait ReactiveSource {
    /// The current value.
    fn current(&self) -> Value;

    /// Run `on_change` after every change until the guard drops.
    fn watch(&self, on_change: Rc<dyn Fn()>) -> Subscription;

    /// Identity of the underlying cell. Two wrappers around the same cell
    /// report the same id.
    fn source_id(&self) -> *const ();
}

impl<T> ReactiveSource for Observable<T>
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    fn current(&self) -> Value {
        self.get().into()
    }

    fn watch(&self, on_change: Rc<dyn Fn()>) -> Subscription {
        self.subscribe(move |_| on_change())
    }

    fn source_id(&self) -> *const () {
        self.as_ptr()
    }
}

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Record(BTreeMap<String, Value>),
    Cell(Rc<dyn ReactiveSource>),
}

impl Value {
    /// Wrap an observable as a reactive path step.
    #[must_use]
    pub fn cell<T>(source: &Observable<T>) -> Self
    where
        T: Clone + PartialEq + Into<Value> + 'static,
    {
        Self::Cell(Rc::new(source.clone()))
    }

    /// Build a record from `(name, value)` pairs.
    #[must_use]
    pub fn record<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Record(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Look up one path segment. Missing fields are `Null`; a cell is
    /// returned as-is for the caller to unwrap and track.
    #[must_use]
    pub fn field(&self, name: &str) -> Value {
        match self {
            Self::Record(fields) => fields.get(name).cloned().unwrap_or_default(),
            Self::List(items) if name == LENGTH => Self::Number(items.len() as f64),
            Self::Text(text) if name == LENGTH => Self::Number(text.chars().count() as f64),
            _ => Self::Null,
        }
    }

    /// The number, if this is one.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Record(a), Self::Record(b)) => a == b,
            (Self::Cell(a), Self::Cell(b)) => a.source_id() == b.source_id(),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(t) => write!(f, "{t:?}"),
            Self::List(items) => f.debug_list().entries(items).finish(),
            Self::Record(fields) => f.debug_map().entries(fields).finish(),
            Self::Cell(source) => f.debug_tuple("Cell").field(&source.current()).finish(),
        }
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Self::Number(n as f64)
                }
            }
        )*
    };
}

number_from!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Observable<Value>> for Value {
    fn from(source: Observable<Value>) -> Self {
        Self::Cell(Rc::new(source))
    }
}

/// A list element that sort key paths can walk.
pub trait Keyed {
    /// The element itself, used when no sort key is set.
    fn key_value(&self) -> Value;

    /// The first path segment. Later segments walk [`Value::field`].
    fn field(&self, name: &str) -> Value {
        self.key_value().field(name)
    }
}

impl Keyed for Value {
    fn key_value(&self) -> Value {
        self.clone()
    }

    fn field(&self, name: &str) -> Value {
        Value::field(self, name)
    }
}

impl<K: Keyed> Keyed for Option<K> {
    fn key_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, Keyed::key_value)
    }

    fn field(&self, name: &str) -> Value {
        self.as_ref().map_or(Value::Null, |k| k.field(name))
    }
}

macro_rules! keyed_scalar {
    ($($ty:ty),*) => {
        $(
            impl Keyed for $ty {
                fn key_value(&self) -> Value {
                    Value::from(self.clone())
                }
            }
        )*
    };
}

keyed_scalar!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, String);

impl Keyed for &'static str {
    fn key_value(&self) -> Value {
        Value::from(*self)
    }
}
