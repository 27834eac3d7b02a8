// src/lib.rs
// persondb - SQL data-access layer
//
// Architecture:
// - Gateway: per-call connections, named binding, materialized results
// - Dispatcher: bootstrap scripts + logical procedure names
// - Stores: a generic one-table repository instantiated per entity
// - Explicit: no retries, no caching, no hidden state between calls

pub mod db;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod query;
pub mod repositories;

pub use db::{CancelToken, ConnectionSource, QueryResult, RowView, SqlGateway};
pub use dispatcher::{Procedure, ScriptDispatcher};
pub use domain::{Person, PersonStore};
pub use error::{DbError, DbResult};
pub use query::{param, Filter, FromSqlValue, SqlParam, SqlValue};
pub use repositories::{AsyncEntityStore, Entity, EntityStore, SqlEntityStore, SQL_NOW};
