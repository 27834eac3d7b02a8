// src/repositories/entity_store.rs
//
// Generic entity store over the SQL gateway

use std::collections::HashSet;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::db::gateway::run_blocking;
use crate::db::SqlGateway;
use crate::error::{DbError, DbResult};
use crate::query::{param, Filter, SqlParam};
use crate::repositories::entity::{Entity, SQL_NOW};

/// Capability interface of a one-table store.
///
/// Stateless request/response façade: every operation opens its own
/// connection through the gateway and owns no state between calls.
pub trait EntityStore<T: Entity>: Send + Sync {
    /// Idempotent create-if-missing DDL.
    fn create_table(&self) -> DbResult<()>;

    /// Idempotent drop-if-exists DDL.
    fn drop_table(&self) -> DbResult<()>;

    /// Fails when the live table is missing a column the entity declares,
    /// including the soft-delete column. Intended as a startup check so a
    /// schema/model mismatch fails loudly instead of no-oping at runtime.
    fn verify_schema(&self) -> DbResult<()>;

    /// INSERT with all fields bound by name. Returns the affected-row count.
    fn add(&self, entity: &T) -> DbResult<usize>;

    /// First row matching `filter`, or `DbError::NotFound`.
    fn first(&self, filter: &Filter) -> DbResult<T>;

    /// First row matching `filter`, or `None`.
    fn first_or_default(&self, filter: &Filter) -> DbResult<Option<T>>;

    /// All rows passing the default not-soft-deleted filter.
    fn find_all(&self) -> DbResult<Vec<T>>;

    /// All rows matching an explicit filter. Sees soft-deleted rows too.
    fn find_where(&self, filter: &Filter) -> DbResult<Vec<T>>;

    /// Whether any row matches `filter`.
    fn check(&self, filter: &Filter) -> DbResult<bool>;

    /// UPDATE of all mutable fields plus a server-side updated-at touch.
    fn update(&self, entity: &T, filter: &Filter) -> DbResult<usize>;

    /// Soft delete: stamps the soft-delete column instead of removing rows.
    /// Fails when the entity declares no soft-delete column.
    fn delete(&self, filter: &Filter) -> DbResult<usize>;

    /// Atomic upsert keyed on the primary key. First call inserts,
    /// subsequent calls update; no check-then-act window.
    fn save(&self, entity: &T) -> DbResult<usize>;
}

/// SQL implementation of [`EntityStore`], generic over the entity shape.
pub struct SqlEntityStore<T: Entity> {
    gateway: SqlGateway,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for SqlEntityStore<T> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> SqlEntityStore<T> {
    pub fn new(gateway: SqlGateway) -> Self {
        Self {
            gateway,
            _entity: PhantomData,
        }
    }

    pub fn gateway(&self) -> &SqlGateway {
        &self.gateway
    }

    /// A store over the same table whose operations observe `token`.
    ///
    /// Pairs with the async surface: cancel the token to abort a
    /// long-running operation mid-statement.
    pub fn with_cancel(&self, token: &crate::db::CancelToken) -> Self {
        Self {
            gateway: self.gateway.with_cancel(token),
            _entity: PhantomData,
        }
    }

    fn select_list() -> String {
        T::columns().join(", ")
    }

    fn insert_sql() -> String {
        let placeholders: Vec<String> = T::columns().iter().map(|c| format!("@{}", c)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            T::TABLE,
            Self::select_list(),
            placeholders.join(", ")
        )
    }

    fn insert_params(entity: &T) -> Vec<SqlParam> {
        T::columns()
            .iter()
            .zip(entity.values())
            .map(|(column, value)| param(*column, value))
            .collect()
    }

    /// Mutable (non-id) columns.
    fn value_columns() -> impl Iterator<Item = &'static str> {
        T::columns().iter().copied().filter(|c| *c != T::ID_COLUMN)
    }

    /// `col = @_col, ...` — the underscore keeps entity values from ever
    /// colliding with filter parameters.
    fn set_clause() -> String {
        let mut assignments: Vec<String> = Self::value_columns()
            .map(|c| format!("{} = @_{}", c, c))
            .collect();
        if let Some(updated) = T::UPDATED_AT_COLUMN {
            assignments.push(format!("{} = {}", updated, SQL_NOW));
        }
        assignments.join(", ")
    }

    fn value_params(entity: &T) -> Vec<SqlParam> {
        T::columns()
            .iter()
            .zip(entity.values())
            .filter(|(column, _)| **column != T::ID_COLUMN)
            .map(|(column, value)| param(format!("_{}", column), value))
            .collect()
    }

    fn upsert_sql() -> String {
        let mut assignments: Vec<String> = Self::value_columns()
            .map(|c| format!("{} = excluded.{}", c, c))
            .collect();
        if let Some(updated) = T::UPDATED_AT_COLUMN {
            assignments.push(format!("{} = {}", updated, SQL_NOW));
        }
        format!(
            "{} ON CONFLICT({}) DO UPDATE SET {}",
            Self::insert_sql(),
            T::ID_COLUMN,
            assignments.join(", ")
        )
    }
}

impl<T: Entity> EntityStore<T> for SqlEntityStore<T> {
    fn create_table(&self) -> DbResult<()> {
        self.gateway.execute_batch(T::create_table_sql())
    }

    fn drop_table(&self) -> DbResult<()> {
        let sql = format!("DROP TABLE IF EXISTS {}", T::TABLE);
        self.gateway.execute(&sql, &[])?;
        Ok(())
    }

    fn verify_schema(&self) -> DbResult<()> {
        let exists = self
            .gateway
            .fetch_all(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = @name",
                &[param("name", T::TABLE)],
            )?
            .first_at::<i64>("count")?
            > 0;
        if !exists {
            return Err(DbError::Schema(format!("table {} does not exist", T::TABLE)));
        }

        let sql = format!("SELECT name FROM pragma_table_info('{}')", T::TABLE);
        let live: HashSet<String> = self
            .gateway
            .fetch_all(&sql, &[])?
            .map_rows(|row| row.get::<String>("name"))?
            .into_iter()
            .collect();

        let mut required: Vec<&str> = T::columns().to_vec();
        required.extend(T::SOFT_DELETE_COLUMN);
        required.extend(T::UPDATED_AT_COLUMN);

        for column in required {
            if !live.contains(column) {
                return Err(DbError::Schema(format!(
                    "table {} is missing column {}",
                    T::TABLE,
                    column
                )));
            }
        }

        Ok(())
    }

    fn add(&self, entity: &T) -> DbResult<usize> {
        let result = self
            .gateway
            .execute(&Self::insert_sql(), &Self::insert_params(entity))?;
        Ok(result.records_affected())
    }

    fn first(&self, filter: &Filter) -> DbResult<T> {
        let (clause, params) = filter.render()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} LIMIT 1",
            Self::select_list(),
            T::TABLE,
            clause
        );
        let result = self.gateway.fetch_all(&sql, &params)?;
        T::from_row(result.first()?)
    }

    fn first_or_default(&self, filter: &Filter) -> DbResult<Option<T>> {
        let (clause, params) = filter.render()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} LIMIT 1",
            Self::select_list(),
            T::TABLE,
            clause
        );
        let result = self.gateway.fetch_all(&sql, &params)?;
        match result.first_or_default() {
            Some(row) => Ok(Some(T::from_row(row)?)),
            None => Ok(None),
        }
    }

    fn find_all(&self) -> DbResult<Vec<T>> {
        match T::SOFT_DELETE_COLUMN {
            Some(column) => self.find_where(&Filter::is_null(column)),
            None => {
                let sql = format!("SELECT {} FROM {}", Self::select_list(), T::TABLE);
                self.gateway.fetch_all(&sql, &[])?.map_rows(T::from_row)
            }
        }
    }

    fn find_where(&self, filter: &Filter) -> DbResult<Vec<T>> {
        let (clause, params) = filter.render()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            Self::select_list(),
            T::TABLE,
            clause
        );
        self.gateway.fetch_all(&sql, &params)?.map_rows(T::from_row)
    }

    fn check(&self, filter: &Filter) -> DbResult<bool> {
        let (clause, params) = filter.render()?;
        let sql = format!("SELECT COUNT(*) AS count FROM {} WHERE {}", T::TABLE, clause);
        let count = self.gateway.fetch_all(&sql, &params)?.first_at::<i64>("count")?;
        Ok(count > 0)
    }

    fn update(&self, entity: &T, filter: &Filter) -> DbResult<usize> {
        let (clause, filter_params) = filter.render()?;
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            T::TABLE,
            Self::set_clause(),
            clause
        );

        // Entity values first so they win any hypothetical name collision.
        let mut params = Self::value_params(entity);
        params.extend(filter_params);

        let result = self.gateway.execute(&sql, &params)?;
        Ok(result.records_affected())
    }

    fn delete(&self, filter: &Filter) -> DbResult<usize> {
        let column = T::SOFT_DELETE_COLUMN.ok_or_else(|| {
            DbError::Schema(format!("{} declares no soft-delete column", T::TABLE))
        })?;

        let (clause, params) = filter.render()?;
        let sql = format!(
            "UPDATE {} SET {} = {} WHERE {}",
            T::TABLE,
            column,
            SQL_NOW,
            clause
        );
        let result = self.gateway.execute(&sql, &params)?;
        Ok(result.records_affected())
    }

    fn save(&self, entity: &T) -> DbResult<usize> {
        let result = self
            .gateway
            .execute(&Self::upsert_sql(), &Self::insert_params(entity))?;
        Ok(result.records_affected())
    }
}

/// Non-blocking counterpart of [`EntityStore`].
///
/// One code path: each method runs its blocking twin on the runtime's
/// blocking pool; cancellation surfaces as `DbError::Cancelled`.
#[async_trait]
pub trait AsyncEntityStore<T>: Send + Sync
where
    T: Entity + Send + Sync + 'static,
{
    async fn create_table_async(&self) -> DbResult<()>;
    async fn drop_table_async(&self) -> DbResult<()>;
    async fn verify_schema_async(&self) -> DbResult<()>;
    async fn add_async(&self, entity: T) -> DbResult<usize>;
    async fn first_async(&self, filter: Filter) -> DbResult<T>;
    async fn first_or_default_async(&self, filter: Filter) -> DbResult<Option<T>>;
    async fn find_all_async(&self) -> DbResult<Vec<T>>;
    async fn find_where_async(&self, filter: Filter) -> DbResult<Vec<T>>;
    async fn check_async(&self, filter: Filter) -> DbResult<bool>;
    async fn update_async(&self, entity: T, filter: Filter) -> DbResult<usize>;
    async fn delete_async(&self, filter: Filter) -> DbResult<usize>;
    async fn save_async(&self, entity: T) -> DbResult<usize>;
}

#[async_trait]
impl<T> AsyncEntityStore<T> for SqlEntityStore<T>
where
    T: Entity + Send + Sync + 'static,
{
    async fn create_table_async(&self) -> DbResult<()> {
        let store = self.clone();
        run_blocking(move || store.create_table()).await
    }

    async fn drop_table_async(&self) -> DbResult<()> {
        let store = self.clone();
        run_blocking(move || store.drop_table()).await
    }

    async fn verify_schema_async(&self) -> DbResult<()> {
        let store = self.clone();
        run_blocking(move || store.verify_schema()).await
    }

    async fn add_async(&self, entity: T) -> DbResult<usize> {
        let store = self.clone();
        run_blocking(move || store.add(&entity)).await
    }

    async fn first_async(&self, filter: Filter) -> DbResult<T> {
        let store = self.clone();
        run_blocking(move || store.first(&filter)).await
    }

    async fn first_or_default_async(&self, filter: Filter) -> DbResult<Option<T>> {
        let store = self.clone();
        run_blocking(move || store.first_or_default(&filter)).await
    }

    async fn find_all_async(&self) -> DbResult<Vec<T>> {
        let store = self.clone();
        run_blocking(move || store.find_all()).await
    }

    async fn find_where_async(&self, filter: Filter) -> DbResult<Vec<T>> {
        let store = self.clone();
        run_blocking(move || store.find_where(&filter)).await
    }

    async fn check_async(&self, filter: Filter) -> DbResult<bool> {
        let store = self.clone();
        run_blocking(move || store.check(&filter)).await
    }

    async fn update_async(&self, entity: T, filter: Filter) -> DbResult<usize> {
        let store = self.clone();
        run_blocking(move || store.update(&entity, &filter)).await
    }

    async fn delete_async(&self, filter: Filter) -> DbResult<usize> {
        let store = self.clone();
        run_blocking(move || store.delete(&filter)).await
    }

    async fn save_async(&self, entity: T) -> DbResult<usize> {
        let store = self.clone();
        run_blocking(move || store.save(&entity)).await
    }
}
