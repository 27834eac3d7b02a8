// src/repositories/entity.rs
//
// Entity metadata

use crate::db::RowView;
use crate::error::DbResult;
use crate::query::{Filter, SqlValue};

/// Server-side "now" expression used for timestamp columns.
///
/// Millisecond resolution so created/updated ordering is observable within
/// a single request.
pub const SQL_NOW: &str = "strftime('%Y-%m-%dT%H:%M:%f','now')";

/// Everything a generic store needs to know about a persisted type.
///
/// One implementation per table. Identity is caller-assigned, never
/// database-generated; timestamp columns are maintained by the store, not
/// carried on the entity.
pub trait Entity: Sized {
    /// Table name. Compile-time constant, never caller input.
    const TABLE: &'static str;

    /// Primary-key column.
    const ID_COLUMN: &'static str = "id";

    /// Soft-delete timestamp column, when the entity supports soft delete.
    /// `None` makes `delete` fail instead of silently no-oping.
    const SOFT_DELETE_COLUMN: Option<&'static str> = Some("deleted_at");

    /// Column touched server-side on every update/upsert.
    const UPDATED_AT_COLUMN: Option<&'static str> = Some("updated_at");

    /// Idempotent DDL for the backing table (may contain several statements).
    fn create_table_sql() -> &'static str;

    /// Insertable columns, id first. Order must match [`values`](Self::values).
    fn columns() -> &'static [&'static str];

    /// Field values in [`columns`](Self::columns) order.
    fn values(&self) -> Vec<SqlValue>;

    fn id_value(&self) -> SqlValue;

    fn from_row(row: RowView<'_>) -> DbResult<Self>;

    /// The default filter: this entity's own id.
    fn by_id(&self) -> Filter {
        Filter::eq(Self::ID_COLUMN, self.id_value())
    }
}
