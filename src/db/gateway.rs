// src/db/gateway.rs
//
// The SQL gateway
//
// PRINCIPLES:
// - One connection per call, released on every exit path
// - Named binding only; values never appear in statement text
// - No caching, no retry: failures go straight to the caller

use std::collections::HashSet;

use log::debug;
use rusqlite::{Connection, ErrorCode, Statement};
use tokio::task::JoinError;

use crate::db::cancel::{CancelToken, InflightGuard};
use crate::db::connection::ConnectionSource;
use crate::db::result::QueryResult;
use crate::error::{DbError, DbResult};
use crate::query::{SqlParam, SqlValue};

/// Issues SQL against the store and materializes results.
///
/// The gateway is stateless apart from its connection source; clones share
/// the source and are safe to hand to other threads or tasks.
#[derive(Clone)]
pub struct SqlGateway {
    source: ConnectionSource,
    cancel: Option<CancelToken>,
}

impl SqlGateway {
    pub fn new(source: ConnectionSource) -> Self {
        Self {
            source,
            cancel: None,
        }
    }

    pub fn source(&self) -> &ConnectionSource {
        &self.source
    }

    /// Returns a gateway over the same source whose calls observe `token`.
    ///
    /// A call made through the returned gateway fails with
    /// `DbError::Cancelled` if the token is already cancelled, and a
    /// `cancel` while its statement is running interrupts the statement.
    pub fn with_cancel(&self, token: &CancelToken) -> Self {
        Self {
            source: self.source.clone(),
            cancel: Some(token.clone()),
        }
    }

    /// Executes `sql` as a query and materializes every row.
    ///
    /// The connection is opened for this call only and closed before
    /// returning, on success and on failure alike. `records_affected`
    /// carries the driver's change count, which matters when a data-changing
    /// statement is routed through the query path.
    pub fn fetch_all(&self, sql: &str, params: &[SqlParam]) -> DbResult<QueryResult> {
        debug!("fetch_all: {}", sql);
        self.check_cancelled()?;
        let conn = self.source.open()?;
        let _inflight = self.arm(&conn)?;
        self.settle(fetch_all_on(&conn, sql, params))
    }

    /// Executes `sql` as a statement, reporting only the affected-row count.
    pub fn execute(&self, sql: &str, params: &[SqlParam]) -> DbResult<QueryResult> {
        debug!("execute: {}", sql);
        self.check_cancelled()?;
        let conn = self.source.open()?;
        let _inflight = self.arm(&conn)?;
        self.settle(execute_on(&conn, sql, params))
    }

    /// Executes a multi-statement script, as used by bootstrap.
    ///
    /// Scripts take no parameters; they are trusted startup input.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        debug!("execute_batch: {} bytes", sql.len());
        self.check_cancelled()?;
        let conn = self.source.open()?;
        let _inflight = self.arm(&conn)?;
        self.settle(conn.execute_batch(sql).map_err(DbError::from))
    }

    /// Non-blocking form of [`fetch_all`](Self::fetch_all).
    ///
    /// Same code path, run on the blocking pool. A bound token (see
    /// [`with_cancel`](Self::with_cancel)) aborts the in-flight statement.
    pub async fn fetch_all_async(
        &self,
        sql: impl Into<String>,
        params: Vec<SqlParam>,
    ) -> DbResult<QueryResult> {
        let gateway = self.clone();
        let sql = sql.into();
        run_blocking(move || gateway.fetch_all(&sql, &params)).await
    }

    /// Non-blocking form of [`execute`](Self::execute).
    pub async fn execute_async(
        &self,
        sql: impl Into<String>,
        params: Vec<SqlParam>,
    ) -> DbResult<QueryResult> {
        let gateway = self.clone();
        let sql = sql.into();
        run_blocking(move || gateway.execute(&sql, &params)).await
    }

    fn check_cancelled(&self) -> DbResult<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(DbError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Registers this call's connection with the bound token, if any.
    fn arm(&self, conn: &Connection) -> DbResult<Option<InflightGuard>> {
        match &self.cancel {
            None => Ok(None),
            Some(token) => {
                let guard = token.register(conn.get_interrupt_handle());
                // Closes the race between the open and the registration.
                if token.is_cancelled() {
                    return Err(DbError::Cancelled);
                }
                Ok(Some(guard))
            }
        }
    }

    /// Reports an interrupted statement as a cancellation when the bound
    /// token asked for one; everything else passes through.
    fn settle<T>(&self, result: DbResult<T>) -> DbResult<T> {
        match (&self.cancel, result) {
            (Some(token), Err(DbError::Query(error)))
                if token.is_cancelled() && is_interrupt(&error) =>
            {
                Err(DbError::Cancelled)
            }
            (_, result) => result,
        }
    }
}

fn fetch_all_on(conn: &Connection, sql: &str, params: &[SqlParam]) -> DbResult<QueryResult> {
    let mut stmt = conn.prepare(sql)?;

    let columns: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    bind_params(&mut stmt, params)?;

    let mut collected = Vec::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            cells.push(SqlValue::try_from(row.get_ref(index)?)?);
        }
        collected.push(cells);
    }
    drop(rows);

    let affected = conn.changes() as usize;
    Ok(QueryResult::with_table(columns, collected, affected))
}

fn execute_on(conn: &Connection, sql: &str, params: &[SqlParam]) -> DbResult<QueryResult> {
    let mut stmt = conn.prepare(sql)?;
    bind_params(&mut stmt, params)?;
    let affected = stmt.raw_execute()?;
    Ok(QueryResult::affected_only(affected))
}

fn is_interrupt(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::OperationInterrupted
    )
}

/// Runs the blocking body of an operation on the runtime's blocking pool.
///
/// A task torn down by runtime shutdown becomes `DbError::Cancelled`; a
/// panicking task is resumed on the caller's thread rather than swallowed.
pub(crate) async fn run_blocking<T, F>(body: F) -> DbResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> DbResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(body).await {
        Ok(result) => result,
        Err(join_error) => Err(map_join_error(join_error)),
    }
}

fn map_join_error(error: JoinError) -> DbError {
    if error.is_cancelled() {
        DbError::Cancelled
    } else {
        std::panic::resume_unwind(error.into_panic())
    }
}

/// Binds named parameters, enforcing the placeholder invariant.
///
/// Every placeholder in the statement must be named and have a supplied
/// parameter; duplicates bind first-occurrence-wins; extra supplied names
/// are ignored. Unnamed `?` placeholders are rejected outright, since the
/// driver would otherwise bind NULL for them without complaint.
fn bind_params(stmt: &mut Statement<'_>, params: &[SqlParam]) -> DbResult<()> {
    for index in 1..=stmt.parameter_count() {
        match stmt.parameter_name(index) {
            Some(name) => {
                if !params.iter().any(|p| p.name == name) {
                    return Err(DbError::MissingParameter(name.to_string()));
                }
            }
            None => {
                return Err(DbError::MissingParameter(format!(
                    "unnamed placeholder at index {}",
                    index
                )))
            }
        }
    }

    let mut bound = HashSet::new();
    for p in params {
        if let Some(index) = stmt.parameter_index(&p.name)? {
            if bound.insert(index) {
                stmt.raw_bind_parameter(index, &p.value)?;
            }
        }
    }

    Ok(())
}
