// src/query/mod.rs
//
// Query building blocks
//
// Provides:
// - SqlValue: the scalar value domain crossing the SQL boundary
// - SqlParam: named parameters bound into statements
// - Filter: structured WHERE clauses (no free-form fragment text)

pub mod filter;
pub mod param;
pub mod value;

pub use filter::Filter;
pub use param::{param, SqlParam};
pub use value::{FromSqlValue, SqlValue};
