// src/dispatcher.rs
//
// Script dispatcher
//
// Runs bootstrap scripts once at startup and resolves logical procedure
// names to executable SQL. SQLite has no server-side procedure catalog, so
// the dispatcher carries its own: bootstrap scripts whose file stem matches
// `{prefix}{separator}{name}` are installed as procedures instead of being
// executed.

use std::collections::HashMap;
use std::path::Path;

use log::info;

use crate::db::{QueryResult, SqlGateway};
use crate::error::{DbError, DbResult};
use crate::db::gateway::run_blocking;
use crate::query::SqlParam;

pub const DEFAULT_PREFIX: &str = "Proc";
pub const DEFAULT_SEPARATOR: &str = "_";

/// Resolves logical operation names to executable procedure calls.
pub struct ScriptDispatcher {
    gateway: SqlGateway,
    prefix: String,
    separator: String,
    procedures: HashMap<String, String>,
}

/// A resolved procedure. Holds the SQL body (when registered) and executes
/// it through the gateway only when called.
#[derive(Clone)]
pub struct Procedure {
    gateway: SqlGateway,
    target: String,
    sql: Option<String>,
}

impl ScriptDispatcher {
    /// Dispatcher with the standard `Proc_{name}` naming convention.
    pub fn new(gateway: SqlGateway) -> Self {
        Self::with_naming(gateway, DEFAULT_PREFIX, DEFAULT_SEPARATOR)
    }

    pub fn with_naming(
        gateway: SqlGateway,
        prefix: impl Into<String>,
        separator: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            prefix: prefix.into(),
            separator: separator.into(),
            procedures: HashMap::new(),
        }
    }

    pub fn gateway(&self) -> &SqlGateway {
        &self.gateway
    }

    /// Pass-through to the gateway's read path.
    pub fn fetch_all(&self, sql: &str, params: &[SqlParam]) -> DbResult<QueryResult> {
        self.gateway.fetch_all(sql, params)
    }

    /// Pass-through to the gateway's write path.
    pub fn execute(&self, sql: &str, params: &[SqlParam]) -> DbResult<QueryResult> {
        self.gateway.execute(sql, params)
    }

    /// Runs the bootstrap scripts in the given order, once, at startup.
    ///
    /// Scripts named `{prefix}{separator}{name}.sql` are installed into the
    /// procedure registry; every other script is executed as a statement.
    /// The first read or execution failure aborts the remaining scripts and
    /// surfaces the error — a fatal startup failure, not a recoverable one.
    pub fn bootstrap<P: AsRef<Path>>(&mut self, scripts: &[P]) -> DbResult<()> {
        let marker = format!("{}{}", self.prefix, self.separator);

        for path in scripts {
            let path = path.as_ref();
            let sql = std::fs::read_to_string(path)?;

            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            if stem.starts_with(&marker) {
                info!("bootstrap: installing procedure {}", stem);
                self.procedures.insert(stem, sql);
            } else {
                info!("bootstrap: executing {}", path.display());
                self.gateway.execute_batch(&sql)?;
            }
        }

        Ok(())
    }

    /// Installs a procedure body directly, bypassing the script files.
    pub fn define(&mut self, name: &str, sql: impl Into<String>) {
        let target = self.target(name);
        self.procedures.insert(target, sql.into());
    }

    /// Resolves `name` to its invocation target without touching the
    /// database. Execution is deferred until the returned procedure is
    /// called; an unregistered target fails at call time.
    pub fn resolve(&self, name: &str) -> Procedure {
        let target = self.target(name);
        Procedure {
            gateway: self.gateway.clone(),
            sql: self.procedures.get(&target).cloned(),
            target,
        }
    }

    fn target(&self, name: &str) -> String {
        format!("{}{}{}", self.prefix, self.separator, name)
    }
}

impl Procedure {
    /// Full procedure name, e.g. `Proc_GetAllPersons`.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// A copy of this procedure whose calls observe `token`.
    pub fn with_cancel(&self, token: &crate::db::CancelToken) -> Self {
        Self {
            gateway: self.gateway.with_cancel(token),
            target: self.target.clone(),
            sql: self.sql.clone(),
        }
    }

    /// Executes the registered body with the supplied parameters.
    ///
    /// Bodies may return rows, change rows, or both; the result carries the
    /// materialized rows alongside the driver's affected-row count.
    pub fn call(&self, params: &[SqlParam]) -> DbResult<QueryResult> {
        let sql = self
            .sql
            .as_deref()
            .ok_or_else(|| DbError::UnknownProcedure(self.target.clone()))?;
        self.gateway.fetch_all(sql, params)
    }

    /// Non-blocking form of [`call`](Self::call).
    pub async fn call_async(&self, params: Vec<SqlParam>) -> DbResult<QueryResult> {
        let procedure = self.clone();
        run_blocking(move || procedure.call(&params)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ConnectionSource;
    use crate::query::param;
    use std::io::Write;

    fn dispatcher() -> ScriptDispatcher {
        ScriptDispatcher::new(SqlGateway::new(ConnectionSource::in_memory().unwrap()))
    }

    fn write_script(dir: &Path, name: &str, sql: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(sql.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_bootstrap_executes_plain_scripts_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_script(dir.path(), "001_tables.sql", "CREATE TABLE a (x INTEGER);");
        let b = write_script(
            dir.path(),
            "002_seed.sql",
            "INSERT INTO a VALUES (1); INSERT INTO a VALUES (2);",
        );

        let mut dispatcher = dispatcher();
        dispatcher.bootstrap(&[a, b]).unwrap();

        let count = dispatcher
            .fetch_all("SELECT COUNT(*) AS count FROM a", &[])
            .unwrap()
            .first_at::<i64>("count")
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_bootstrap_failure_aborts_remaining_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_script(dir.path(), "001_bad.sql", "CREATE BOGUS SYNTAX;");
        let good = write_script(dir.path(), "002_good.sql", "CREATE TABLE b (x INTEGER);");

        let mut dispatcher = dispatcher();
        let err = dispatcher.bootstrap(&[bad, good]).unwrap_err();
        assert!(matches!(err, DbError::Query(_)));

        // The second script never ran.
        let exists = dispatcher
            .fetch_all(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE name = 'b'",
                &[],
            )
            .unwrap()
            .first_at::<i64>("count")
            .unwrap();
        assert_eq!(exists, 0);
    }

    #[test]
    fn test_bootstrap_unreadable_script_aborts() {
        let mut dispatcher = dispatcher();
        let err = dispatcher
            .bootstrap(&["/nonexistent/script.sql"])
            .unwrap_err();
        assert!(matches!(err, DbError::Io(_)));
    }

    #[test]
    fn test_bootstrap_installs_prefixed_scripts_as_procedures() {
        let dir = tempfile::tempdir().unwrap();
        let tables = write_script(
            dir.path(),
            "001_tables.sql",
            "CREATE TABLE a (x INTEGER); INSERT INTO a VALUES (41);",
        );
        let proc = write_script(
            dir.path(),
            "Proc_CountA.sql",
            "SELECT COUNT(*) AS count FROM a WHERE x > @min",
        );

        let mut dispatcher = dispatcher();
        dispatcher.bootstrap(&[tables, proc]).unwrap();

        let count = dispatcher
            .resolve("CountA")
            .call(&[param("min", 40i64)])
            .unwrap()
            .first_at::<i64>("count")
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_data_changing_procedure_reports_affected_rows() {
        let mut dispatcher = dispatcher();
        dispatcher
            .gateway()
            .execute_batch("CREATE TABLE a (x INTEGER); INSERT INTO a VALUES (1);")
            .unwrap();
        dispatcher.define("DoubleA", "INSERT INTO a SELECT x + @offset FROM a");

        let result = dispatcher
            .resolve("DoubleA")
            .call(&[param("offset", 100i64)])
            .unwrap();
        assert_eq!(result.records_affected(), 1);
        assert_eq!(result.row_count(), 0);

        let count = dispatcher
            .fetch_all("SELECT COUNT(*) AS count FROM a", &[])
            .unwrap()
            .first_at::<i64>("count")
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_cancelled_procedure_call_is_cancelled() {
        let mut dispatcher = dispatcher();
        dispatcher.define("Ping", "SELECT 1 AS one");

        let token = crate::db::CancelToken::new();
        token.cancel();
        let err = dispatcher
            .resolve("Ping")
            .with_cancel(&token)
            .call(&[])
            .unwrap_err();
        assert!(matches!(err, DbError::Cancelled));
    }

    #[test]
    fn test_resolve_defers_execution() {
        let mut dispatcher = dispatcher();
        dispatcher.define("Boom", "SELECT * FROM missing_table");

        // Resolving must not touch the database; only the call fails.
        let procedure = dispatcher.resolve("Boom");
        assert_eq!(procedure.target(), "Proc_Boom");
        assert!(matches!(procedure.call(&[]), Err(DbError::Query(_))));
    }

    #[test]
    fn test_unknown_procedure_fails_at_call_time() {
        let dispatcher = dispatcher();
        let procedure = dispatcher.resolve("Nowhere");
        let err = procedure.call(&[]).unwrap_err();
        assert!(matches!(err, DbError::UnknownProcedure(name) if name == "Proc_Nowhere"));
    }

    #[test]
    fn test_custom_naming_convention() {
        let gateway = SqlGateway::new(ConnectionSource::in_memory().unwrap());
        let mut dispatcher = ScriptDispatcher::with_naming(gateway, "sp", "__");
        dispatcher.define("Ping", "SELECT 1 AS one");

        let result = dispatcher.resolve("Ping").call(&[]).unwrap();
        assert_eq!(result.first_at::<i64>("one").unwrap(), 1);
        assert_eq!(dispatcher.resolve("Ping").target(), "sp__Ping");
    }

    #[tokio::test]
    async fn test_call_async() {
        let mut dispatcher = dispatcher();
        dispatcher.define("One", "SELECT 1 AS one");

        let result = dispatcher.resolve("One").call_async(vec![]).await.unwrap();
        assert_eq!(result.first_at::<i64>("one").unwrap(), 1);
    }
}
