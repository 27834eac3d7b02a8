// src/error/types.rs
use thiserror::Error;

/// Failure taxonomy for the data-access layer.
///
/// Nothing here retries or recovers: every failure is surfaced to the
/// immediate caller, which decides what to do with it. `NotFound` is kept
/// separate from `Query` so callers can branch on "absent" vs "broken".
#[derive(Debug, Error)]
pub enum DbError {
    /// The connection to the database could not be opened.
    #[error("Connection error: {0}")]
    Connection(#[source] rusqlite::Error),

    /// The engine rejected the statement (syntax, constraint, type).
    #[error("Query error: {0}")]
    Query(#[from] rusqlite::Error),

    /// A statement references a placeholder with no supplied parameter.
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// A "first" lookup matched zero rows.
    #[error("No rows matched the query")]
    NotFound,

    /// Caller-requested cancellation was observed mid-flight.
    #[error("Operation cancelled")]
    Cancelled,

    /// The live table shape does not match what the entity declares.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A column value could not be converted to the requested type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A resolved procedure name has no registered body.
    #[error("Unknown procedure: {0}")]
    UnknownProcedure(String),

    /// A bootstrap script could not be read.
    #[error("Script error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinct_from_query() {
        let err = DbError::NotFound;
        assert!(matches!(err, DbError::NotFound));
        assert_eq!(err.to_string(), "No rows matched the query");
    }

    #[test]
    fn test_rusqlite_error_converts_to_query() {
        let err: DbError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, DbError::Query(_)));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing script");
        let err: DbError = io.into();
        assert!(matches!(err, DbError::Io(_)));
    }
}
