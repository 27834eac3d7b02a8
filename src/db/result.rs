// src/db/result.rs
//
// Tabular query results

use crate::error::{DbError, DbResult};
use crate::query::{FromSqlValue, SqlValue};

/// The outcome of a single gateway call.
///
/// Read paths carry a materialized table; write paths carry only the
/// affected-row count. Constructed once per call and immutable afterwards.
#[derive(Debug, Clone)]
pub struct QueryResult {
    table: Option<Table>,
    records_affected: usize,
}

#[derive(Debug, Clone)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
}

/// Borrowed view of one result row, with column-by-name access.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    columns: &'a [String],
    values: &'a [SqlValue],
}

impl QueryResult {
    pub(crate) fn with_table(
        columns: Vec<String>,
        rows: Vec<Vec<SqlValue>>,
        records_affected: usize,
    ) -> Self {
        Self {
            table: Some(Table { columns, rows }),
            records_affected,
        }
    }

    pub(crate) fn affected_only(records_affected: usize) -> Self {
        Self {
            table: None,
            records_affected,
        }
    }

    /// Rows changed by a write. Zero for pure reads.
    pub fn records_affected(&self) -> usize {
        self.records_affected
    }

    /// Number of materialized rows; zero when no table was produced.
    pub fn row_count(&self) -> usize {
        self.table.as_ref().map_or(0, |t| t.rows.len())
    }

    /// Column names of the materialized table, empty when absent.
    pub fn columns(&self) -> &[String] {
        self.table.as_ref().map_or(&[], |t| t.columns.as_slice())
    }

    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        self.table.iter().flat_map(|t| {
            t.rows.iter().map(|values| RowView {
                columns: &t.columns,
                values,
            })
        })
    }

    /// First row, failing with `NotFound` when the result is empty.
    pub fn first(&self) -> DbResult<RowView<'_>> {
        self.rows().next().ok_or(DbError::NotFound)
    }

    /// First row, or `None` when the result is empty.
    pub fn first_or_default(&self) -> Option<RowView<'_>> {
        self.rows().next()
    }

    /// Typed value of `column` in the first row.
    pub fn first_at<T: FromSqlValue>(&self, column: &str) -> DbResult<T> {
        self.first()?.get(column)
    }

    /// Typed value of `column` in the first row, or `None` on an empty result.
    pub fn first_or_default_at<T: FromSqlValue>(&self, column: &str) -> DbResult<Option<T>> {
        match self.first_or_default() {
            Some(row) => row.get(column).map(Some),
            None => Ok(None),
        }
    }

    /// Maps every row through `selector`, materializing the results.
    ///
    /// Re-invoke the originating call to restart the sequence; the returned
    /// vector itself is plain data.
    pub fn map_rows<T, F>(&self, mut selector: F) -> DbResult<Vec<T>>
    where
        F: FnMut(RowView<'_>) -> DbResult<T>,
    {
        self.rows().map(&mut selector).collect()
    }
}

impl<'a> RowView<'a> {
    /// Typed value of the named column.
    pub fn get<T: FromSqlValue>(&self, column: &str) -> DbResult<T> {
        T::from_sql_value(self.raw(column)?)
    }

    /// Raw cell of the named column.
    pub fn raw(&self, column: &str) -> DbResult<&'a SqlValue> {
        let index = self
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| DbError::Decode(format!("no such column: {}", column)))?;
        Ok(&self.values[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QueryResult {
        QueryResult::with_table(
            vec!["id".to_string(), "age".to_string()],
            vec![
                vec![SqlValue::from("AAAAAAAA"), SqlValue::from(30i64)],
                vec![SqlValue::from("BBBBBBBB"), SqlValue::from(41i64)],
            ],
            0,
        )
    }

    #[test]
    fn test_row_count_zero_without_table() {
        let result = QueryResult::affected_only(3);
        assert_eq!(result.row_count(), 0);
        assert_eq!(result.records_affected(), 3);
        assert!(result.columns().is_empty());
    }

    #[test]
    fn test_first_at_typed_extraction() {
        let result = sample();
        assert_eq!(result.first_at::<String>("id").unwrap(), "AAAAAAAA");
        assert_eq!(result.first_at::<i64>("age").unwrap(), 30);
    }

    #[test]
    fn test_first_on_empty_is_not_found() {
        let empty = QueryResult::with_table(vec!["id".to_string()], vec![], 0);
        assert!(matches!(empty.first(), Err(DbError::NotFound)));
        assert!(empty.first_or_default().is_none());
        assert_eq!(empty.first_or_default_at::<String>("id").unwrap(), None);
    }

    #[test]
    fn test_map_rows() {
        let pairs = sample()
            .map_rows(|row| Ok((row.get::<String>("id")?, row.get::<i64>("age")?)))
            .unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1], ("BBBBBBBB".to_string(), 41));
    }

    #[test]
    fn test_unknown_column_is_decode_error() {
        let result = sample();
        let err = result.first_at::<String>("missing").unwrap_err();
        assert!(matches!(err, DbError::Decode(_)));
    }
}
