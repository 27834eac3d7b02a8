// tests/startup_flow.rs
//
// The application startup path: bootstrap scripts, then procedure calls and
// store operations against the same database.

use std::io::Write;
use std::path::{Path, PathBuf};

use persondb::{
    param, ConnectionSource, DbError, Entity, EntityStore, Person, PersonStore, ScriptDispatcher,
    SqlGateway,
};

fn write_script(dir: &Path, name: &str, sql: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(sql.as_bytes()).unwrap();
    path
}

#[test]
fn test_bootstrap_then_store_and_procedures_share_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_script(
        dir.path(),
        "001_schema.sql",
        "CREATE TABLE IF NOT EXISTS persons (
             id TEXT PRIMARY KEY CHECK (length(id) <= 8),
             name TEXT,
             age INTEGER,
             created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f','now')),
             updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f','now')),
             deleted_at TEXT NULL
         );",
    );
    let procedure = write_script(
        dir.path(),
        "Proc_GetAllPersons.sql",
        "SELECT id, name, age FROM persons WHERE deleted_at IS NULL",
    );
    let adults = write_script(
        dir.path(),
        "Proc_CountAdults.sql",
        "SELECT COUNT(*) AS count FROM persons WHERE age >= @min_age AND deleted_at IS NULL",
    );

    let gateway = SqlGateway::new(ConnectionSource::in_memory().unwrap());
    let mut dispatcher = ScriptDispatcher::new(gateway.clone());
    dispatcher.bootstrap(&[schema, procedure, adults]).unwrap();

    let store = PersonStore::new(gateway);
    store.verify_schema().unwrap();
    store.add(&Person::new("AAAAAAAA", "James", 30)).unwrap();
    store.add(&Person::new("BBBBBBBB", "Ann", 12)).unwrap();

    let everyone = dispatcher.resolve("GetAllPersons").call(&[]).unwrap();
    assert_eq!(everyone.row_count(), 2);

    let count = dispatcher
        .resolve("CountAdults")
        .call(&[param("min_age", 18i64)])
        .unwrap()
        .first_at::<i64>("count")
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_bootstrap_against_file_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_script(
        dir.path(),
        "001_schema.sql",
        "CREATE TABLE IF NOT EXISTS persons (
             id TEXT PRIMARY KEY,
             name TEXT,
             age INTEGER,
             created_at TEXT NOT NULL DEFAULT (datetime('now')),
             updated_at TEXT NOT NULL DEFAULT (datetime('now')),
             deleted_at TEXT NULL
         );",
    );

    let db_path = dir.path().join("people.db");

    {
        let gateway = SqlGateway::new(ConnectionSource::file(&db_path));
        let mut dispatcher = ScriptDispatcher::new(gateway.clone());
        dispatcher.bootstrap(&[schema]).unwrap();
        PersonStore::new(gateway)
            .add(&Person::new("AAAAAAAA", "James", 30))
            .unwrap();
    }

    // A fresh gateway over the same file sees the data.
    let store = PersonStore::new(SqlGateway::new(ConnectionSource::file(&db_path)));
    let person = store.first(&Person::new("AAAAAAAA", "", 0).by_id()).unwrap();
    assert_eq!(person.name, "James");
    assert_eq!(person.age, 30);
}

#[test]
fn test_unresolvable_procedure_surfaces_at_call_time_only() {
    let gateway = SqlGateway::new(ConnectionSource::in_memory().unwrap());
    let dispatcher = ScriptDispatcher::new(gateway);

    let procedure = dispatcher.resolve("Missing");
    assert_eq!(procedure.target(), "Proc_Missing");
    assert!(matches!(
        procedure.call(&[]),
        Err(DbError::UnknownProcedure(_))
    ));
}
