#![forbid(unsafe_code)]

//! Sorted view configuration.

use std::fmt;
use std::rc::Rc;

use crate::collate::Collator;

/// Initial configuration of a [`SortedView`](crate::SortedView).
///
/// `key` is a comma-separated list of dotted paths; `None` or an empty string
/// sorts by the elements themselves.
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SortOptions {
    pub key: Option<String>,
    pub descending: bool,
    pub nulls_to_bottom: bool,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub collator: Option<Rc<dyn Collator>>,
}

impl SortOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }

    #[must_use]
    pub fn with_nulls_to_bottom(mut self, nulls_to_bottom: bool) -> Self {
        self.nulls_to_bottom = nulls_to_bottom;
        self
    }

    #[must_use]
    pub fn with_collator(mut self, collator: impl Collator + 'static) -> Self {
        self.collator = Some(Rc::new(collator));
        self
    }
}

impl fmt::Debug for SortOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortOptions")
            .field("key", &self.key)
            .field("descending", &self.descending)
            .field("nulls_to_bottom", &self.nulls_to_bottom)
            .field(
                "collator",
                &self
                    .collator
                    .as_ref()
                    .map(|collator| collator.locale().unwrap_or("custom")),
            )
            .finish()
    }
}
