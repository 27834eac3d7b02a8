// src/query/value.rs
//
// Scalar values crossing the SQL boundary

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::{Null, ToSqlOutput, ValueRef};
use rusqlite::ToSql;

use crate::error::{DbError, DbResult};

/// A scalar value as stored by the engine.
///
/// Mirrors SQLite's storage classes. Values are owned; a `QueryResult` holds
/// its cells as `SqlValue` so results stay usable after the connection closes.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Name of the storage class, for decode error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Integer(_) => "INTEGER",
            SqlValue::Real(_) => "REAL",
            SqlValue::Text(_) => "TEXT",
            SqlValue::Blob(_) => "BLOB",
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Text(v.to_rfc3339())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

impl TryFrom<ValueRef<'_>> for SqlValue {
    type Error = DbError;

    /// A TEXT cell that is not valid UTF-8 is a decode failure, not
    /// something to repair with replacement characters.
    fn try_from(v: ValueRef<'_>) -> DbResult<Self> {
        Ok(match v {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(t) => SqlValue::Text(
                std::str::from_utf8(t)
                    .map_err(|e| DbError::Decode(format!("TEXT cell is not UTF-8: {}", e)))?
                    .to_string(),
            ),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        })
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::from(Null),
            SqlValue::Integer(i) => ToSqlOutput::from(*i),
            SqlValue::Real(f) => ToSqlOutput::from(*f),
            SqlValue::Text(s) => ToSqlOutput::from(s.as_str()),
            SqlValue::Blob(b) => ToSqlOutput::from(b.as_slice()),
        })
    }
}

/// Fallible extraction of a Rust value out of a result cell.
pub trait FromSqlValue: Sized {
    fn from_sql_value(value: &SqlValue) -> DbResult<Self>;
}

fn decode_err(expected: &str, got: &SqlValue) -> DbError {
    DbError::Decode(format!("expected {}, got {}", expected, got.type_name()))
}

impl FromSqlValue for String {
    fn from_sql_value(value: &SqlValue) -> DbResult<Self> {
        match value {
            SqlValue::Text(s) => Ok(s.clone()),
            other => Err(decode_err("TEXT", other)),
        }
    }
}

impl FromSqlValue for i64 {
    fn from_sql_value(value: &SqlValue) -> DbResult<Self> {
        match value {
            SqlValue::Integer(i) => Ok(*i),
            other => Err(decode_err("INTEGER", other)),
        }
    }
}

impl FromSqlValue for i32 {
    fn from_sql_value(value: &SqlValue) -> DbResult<Self> {
        let wide = i64::from_sql_value(value)?;
        i32::try_from(wide).map_err(|_| DbError::Decode(format!("{} out of range for i32", wide)))
    }
}

impl FromSqlValue for f64 {
    fn from_sql_value(value: &SqlValue) -> DbResult<Self> {
        match value {
            SqlValue::Real(f) => Ok(*f),
            SqlValue::Integer(i) => Ok(*i as f64),
            other => Err(decode_err("REAL", other)),
        }
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: &SqlValue) -> DbResult<Self> {
        Ok(i64::from_sql_value(value)? != 0)
    }
}

impl FromSqlValue for DateTime<Utc> {
    fn from_sql_value(value: &SqlValue) -> DbResult<Self> {
        let text = String::from_sql_value(value)?;
        // Timestamps written by this layer use strftime('%Y-%m-%dT%H:%M:%f'),
        // but accept RFC 3339 and datetime('now') output as well.
        if let Ok(dt) = NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(dt.and_utc());
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f") {
            return Ok(dt.and_utc());
        }
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| DbError::Decode(format!("bad timestamp {:?}: {}", text, e)))
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: &SqlValue) -> DbResult<Self> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(SqlValue::from(42i64), SqlValue::Integer(42));
        assert_eq!(SqlValue::from("hi"), SqlValue::Text("hi".to_string()));
        assert_eq!(SqlValue::from(true), SqlValue::Integer(1));
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(7i64)), SqlValue::Integer(7));
    }

    #[test]
    fn test_typed_extraction_round_trip() {
        let s = String::from_sql_value(&SqlValue::from("James")).unwrap();
        assert_eq!(s, "James");

        let n = i64::from_sql_value(&SqlValue::from(30i64)).unwrap();
        assert_eq!(n, 30);
    }

    #[test]
    fn test_type_mismatch_is_decode_error() {
        let err = String::from_sql_value(&SqlValue::Integer(1)).unwrap_err();
        assert!(matches!(err, crate::error::DbError::Decode(_)));
    }

    #[test]
    fn test_option_extraction() {
        let none: Option<String> = Option::from_sql_value(&SqlValue::Null).unwrap();
        assert!(none.is_none());

        let some: Option<i64> = Option::from_sql_value(&SqlValue::Integer(3)).unwrap();
        assert_eq!(some, Some(3));
    }

    #[test]
    fn test_text_cell_must_be_valid_utf8() {
        let ok = SqlValue::try_from(ValueRef::Text("hi".as_bytes())).unwrap();
        assert_eq!(ok, SqlValue::Text("hi".to_string()));

        let err = SqlValue::try_from(ValueRef::Text(&[0xff, 0xfe])).unwrap_err();
        assert!(matches!(err, crate::error::DbError::Decode(_)));
    }

    #[test]
    fn test_timestamp_extraction() {
        let v = SqlValue::from("2024-05-01T10:30:00.250");
        let dt = DateTime::<Utc>::from_sql_value(&v).unwrap();
        assert_eq!(dt.timestamp_subsec_millis(), 250);

        let plain = SqlValue::from("2024-05-01 10:30:00");
        assert!(DateTime::<Utc>::from_sql_value(&plain).is_ok());
    }
}
