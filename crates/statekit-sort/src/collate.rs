#![forbid(unsafe_code)]

//! Locale-aware text ordering.
//!
//! The default text comparison is a case-insensitive code-point order. A
//! [`Collator`] replaces it; [`BaseCollator`] is the stock one and compares
//! base letters only, so accents and case do not affect the order.

use std::cmp::Ordering;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// A text comparison strategy.
pub trait Collator {
    fn compare(&self, a: &str, b: &str) -> Ordering;

    /// Locale tag, when the collator was built for one.
    fn locale(&self) -> Option<&str> {
        None
    }
}

impl<F> Collator for F
where
    F: Fn(&str, &str) -> Ordering,
{
    fn compare(&self, a: &str, b: &str) -> Ordering {
        self(a, b)
    }
}

/// Compares strings by base letter: decomposes, drops combining marks and
/// lowercases before comparing.
///
/// The locale tag is carried for diagnostics only; folding is the same for
/// every locale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseCollator {
    locale: Option<String>,
}

impl BaseCollator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_locale(tag: impl Into<String>) -> Self {
        Self {
            locale: Some(tag.into()),
        }
    }

    /// The key this collator compares by.
    #[must_use]
    pub fn fold(text: &str) -> String {
        text.nfd()
            .filter(|c| !is_combining_mark(*c))
            .flat_map(char::to_lowercase)
            .collect()
    }
}

impl Collator for BaseCollator {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        Self::fold(a).cmp(&Self::fold(b))
    }

    fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }
}

/// The comparison used when no collator is configured.
pub(crate) fn case_insensitive(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_orders_by_lowercase() {
        assert_eq!(case_insensitive("AA", "ab"), Ordering::Less);
        assert_eq!(case_insensitive("a", "A"), Ordering::Equal);
        assert_eq!(case_insensitive("b", "AB"), Ordering::Greater);
    }

    #[test]
    fn base_collator_ignores_accents() {
        let collator = BaseCollator::for_locale("fr");
        assert_eq!(collator.compare("café", "CAFE"), Ordering::Equal);
        assert_eq!(collator.compare("élan", "fable"), Ordering::Less);
        assert_eq!(collator.locale(), Some("fr"));
        // Without folding, 'é' sorts after every ASCII letter.
        assert_eq!(case_insensitive("élan", "fable"), Ordering::Greater);
    }

    #[test]
    fn closures_are_collators() {
        let by_len = |a: &str, b: &str| a.len().cmp(&b.len());
        assert_eq!(by_len.compare("zz", "aaa"), Ordering::Less);
    }
}
