// src/domain/person.rs
//
// The Person record and its table mapping

use serde::{Deserialize, Serialize};

use crate::db::RowView;
use crate::error::DbResult;
use crate::query::SqlValue;
use crate::repositories::{Entity, SqlEntityStore};

/// A person row. Identity is caller-assigned (a short string, at most 8
/// characters); timestamps live on the table, not on the record.
///
/// Wire shape: `{ "id": string, "name": string, "age": integer }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub age: i64,
}

impl Person {
    pub fn new(id: impl Into<String>, name: impl Into<String>, age: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            age,
        }
    }
}

impl Entity for Person {
    const TABLE: &'static str = "persons";

    fn create_table_sql() -> &'static str {
        "CREATE TABLE IF NOT EXISTS persons (
             id TEXT PRIMARY KEY CHECK (length(id) <= 8),
             name TEXT,
             age INTEGER,
             created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f','now')),
             updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f','now')),
             deleted_at TEXT NULL
         );"
    }

    fn columns() -> &'static [&'static str] {
        &["id", "name", "age"]
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.id.clone().into(),
            self.name.clone().into(),
            self.age.into(),
        ]
    }

    fn id_value(&self) -> SqlValue {
        self.id.clone().into()
    }

    fn from_row(row: RowView<'_>) -> DbResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            age: row.get("age")?,
        })
    }
}

/// The one-table store this crate instantiates.
pub type PersonStore = SqlEntityStore<Person>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let person = Person::new("AAAAAAAA", "James", 30);
        let json = serde_json::to_value(&person).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "id": "AAAAAAAA", "name": "James", "age": 30 })
        );

        let back: Person = serde_json::from_value(json).unwrap();
        assert_eq!(back, person);
    }

    #[test]
    fn test_default_filter_targets_own_id() {
        let person = Person::new("AAAAAAAA", "James", 30);
        let (sql, params) = person.by_id().render().unwrap();
        assert_eq!(sql, "id = @w0");
        assert_eq!(params[0].value, SqlValue::Text("AAAAAAAA".to_string()));
    }
}
