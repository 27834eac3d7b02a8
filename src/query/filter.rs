// src/query/filter.rs
//
// Structured WHERE clauses
//
// RULES:
// - No free-form fragment text from callers
// - Column names must be bare identifiers
// - Values always travel as named parameters

use crate::error::{DbError, DbResult};
use crate::query::{SqlParam, SqlValue};

/// A WHERE clause built from tagged comparisons instead of raw text.
///
/// Rendering produces the SQL fragment plus generated `@w{n}` parameters, so
/// caller values can never leak into statement text.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, SqlValue),
    Ne(String, SqlValue),
    Gt(String, SqlValue),
    Lt(String, SqlValue),
    Between(String, SqlValue, SqlValue),
    IsNull(String),
    IsNotNull(String),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Filter::Eq(column.into(), value.into())
    }

    pub fn ne(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Filter::Ne(column.into(), value.into())
    }

    pub fn gt(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Filter::Gt(column.into(), value.into())
    }

    pub fn lt(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Filter::Lt(column.into(), value.into())
    }

    pub fn between(
        column: impl Into<String>,
        low: impl Into<SqlValue>,
        high: impl Into<SqlValue>,
    ) -> Self {
        Filter::Between(column.into(), low.into(), high.into())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Filter::IsNull(column.into())
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Filter::IsNotNull(column.into())
    }

    pub fn and(self, other: Filter) -> Self {
        Filter::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Filter) -> Self {
        Filter::Or(Box::new(self), Box::new(other))
    }

    /// Renders the filter into a SQL fragment and its parameters.
    ///
    /// Fails with `DbError::Schema` when a column name is not a bare
    /// identifier.
    pub fn render(&self) -> DbResult<(String, Vec<SqlParam>)> {
        let mut params = Vec::new();
        let mut counter = 0usize;
        let sql = self.render_node(&mut params, &mut counter)?;
        Ok((sql, params))
    }

    fn render_node(&self, params: &mut Vec<SqlParam>, counter: &mut usize) -> DbResult<String> {
        let mut bind = |value: &SqlValue, params: &mut Vec<SqlParam>, counter: &mut usize| {
            let name = format!("@w{}", *counter);
            *counter += 1;
            params.push(SqlParam::new(&name, value.clone()));
            name
        };

        match self {
            Filter::Eq(col, v) => {
                check_identifier(col)?;
                Ok(format!("{} = {}", col, bind(v, params, counter)))
            }
            Filter::Ne(col, v) => {
                check_identifier(col)?;
                Ok(format!("{} <> {}", col, bind(v, params, counter)))
            }
            Filter::Gt(col, v) => {
                check_identifier(col)?;
                Ok(format!("{} > {}", col, bind(v, params, counter)))
            }
            Filter::Lt(col, v) => {
                check_identifier(col)?;
                Ok(format!("{} < {}", col, bind(v, params, counter)))
            }
            Filter::Between(col, low, high) => {
                check_identifier(col)?;
                let low = bind(low, params, counter);
                let high = bind(high, params, counter);
                Ok(format!("{} BETWEEN {} AND {}", col, low, high))
            }
            Filter::IsNull(col) => {
                check_identifier(col)?;
                Ok(format!("{} IS NULL", col))
            }
            Filter::IsNotNull(col) => {
                check_identifier(col)?;
                Ok(format!("{} IS NOT NULL", col))
            }
            Filter::And(a, b) => {
                let a = a.render_node(params, counter)?;
                let b = b.render_node(params, counter)?;
                Ok(format!("({} AND {})", a, b))
            }
            Filter::Or(a, b) => {
                let a = a.render_node(params, counter)?;
                let b = b.render_node(params, counter)?;
                Ok(format!("({} OR {})", a, b))
            }
        }
    }
}

fn check_identifier(name: &str) -> DbResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(DbError::Schema(format!("invalid column name: {:?}", name)))
    }
}
