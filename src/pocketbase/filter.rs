//! Filter expression builder for list queries.
//!
//! Produces strings such as `user = "u1" && ticker = "t1"` or
//! `ticker = "a" || ticker = "b"`, evaluated server-side.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter(String);

impl Filter {
    /// `field = "value"`
    pub fn eq(field: &str, value: &str) -> Self {
        Self(format!("{} = {}", field, quote(value)))
    }

    /// `field != "value"`
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn ne(field: &str, value: &str) -> Self {
        Self(format!("{} != {}", field, quote(value)))
    }

    pub fn and(self, other: Filter) -> Self {
        Self(format!("{} && {}", self.0, other.0))
    }

    pub fn or(self, other: Filter) -> Self {
        Self(format!("{} || {}", self.0, other.0))
    }

    /// OR-joined equality over every value. `None` for an empty set.
    pub fn any_eq<S: AsRef<str>>(field: &str, values: &[S]) -> Option<Self> {
        values
            .iter()
            .map(|v| Filter::eq(field, v.as_ref()))
            .reduce(Filter::or)
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}
