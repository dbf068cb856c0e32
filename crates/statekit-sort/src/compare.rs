#![forbid(unsafe_code)]

//! Null-aware, direction-aware key comparison.
//!
//! # Null placement
//!
//! | `nulls_to_bottom` | `descending` | nulls go |
//! |-------------------|--------------|----------|
//! | false             | false        | first    |
//! | false             | true         | last     |
//! | true              | either       | last     |
//!
//! Null placement is decided before the direction flip, so descending never
//! moves nulls back to the top.

use std::cmp::Ordering;

use crate::collate::{Collator, case_insensitive};
use crate::value::Value;

/// Compares resolved sort keys.
#[derive(Clone, Copy, Default)]
pub struct Comparator<'a> {
    pub descending: bool,
    pub nulls_to_bottom: bool,
    pub collator: Option<&'a dyn Collator>,
}

impl Comparator<'_> {
    /// Compare one key.
    #[must_use]
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let nulls_last = self.nulls_to_bottom || self.descending;
        match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) if nulls_last => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, true) if nulls_last => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => {
                let ordering = self.compare_present(a, b);
                if self.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
        }
    }

    /// Compare key tuples left to right; the first non-equal key wins.
    #[must_use]
    pub fn compare_keys(&self, a: &[Value], b: &[Value]) -> Ordering {
        a.iter()
            .zip(b)
            .map(|(x, y)| self.compare(x, y))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    fn compare_present(&self, a: &Value, b: &Value) -> Ordering {
        match (a, b) {
            (Value::Text(x), Value::Text(y)) => match self.collator {
                Some(collator) => collator.compare(x, y),
                None => case_insensitive(x, y),
            },
            (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => kind_rank(a).cmp(&kind_rank(b)),
        }
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::Text(_) => 3,
        Value::List(_) | Value::Record(_) | Value::Cell(_) => 4,
    }
}
