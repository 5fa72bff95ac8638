//! Query parameter helpers.
//!
//! Listing endpoints accept a `where` predicate such as `id EQ 12`. This module
//! renders those predicates and collects them into query pairs.

use std::fmt::{self, Display};

/// A single `<field> EQ <value>` predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    field: &'static str,
    value: String,
}

impl Predicate {
    /// Equality predicate, e.g. `id EQ 12`.
    pub fn equals(field: &'static str, value: impl Display) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} EQ {}", self.field, self.value)
    }
}

/// Builder for assembling query parameter pairs.
#[derive(Debug, Default, Clone)]
pub struct QueryParams {
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Append a `where` predicate.
    pub fn push_where(&mut self, predicate: &Predicate) {
        self.pairs.push(("where", predicate.to_string()));
    }

    /// Shorthand for a query consisting of a single `where` predicate.
    #[must_use]
    pub fn filter(predicate: &Predicate) -> Vec<(&'static str, String)> {
        let mut params = Self::new();
        params.push_where(predicate);
        params.into_pairs()
    }

    /// Return the collected key/value pairs.
    #[must_use]
    pub fn into_pairs(self) -> Vec<(&'static str, String)> {
        self.pairs
    }
}
