// src/query/param.rs
//
// Named statement parameters

use crate::query::SqlValue;

/// A named parameter bound into SQL text via an `@name` placeholder.
///
/// Values always travel through the binder; only statement skeletons are
/// ever rendered as text.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParam {
    /// Placeholder name, stored with the `@` prefix.
    pub name: String,
    pub value: SqlValue,
}

impl SqlParam {
    /// Builds a parameter. The `@` prefix is added when missing, so
    /// `SqlParam::new("id", ...)` and `SqlParam::new("@id", ...)` are the same.
    pub fn new(name: impl AsRef<str>, value: impl Into<SqlValue>) -> Self {
        let name = name.as_ref();
        let name = if name.starts_with('@') {
            name.to_string()
        } else {
            format!("@{}", name)
        };
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Shorthand used throughout the crate.
pub fn param(name: impl AsRef<str>, value: impl Into<SqlValue>) -> SqlParam {
    SqlParam::new(name, value)
}
