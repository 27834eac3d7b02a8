// src/error/mod.rs
//
// Error types shared by the whole data-access layer

pub mod types;

pub use types::{DbError, DbResult};
