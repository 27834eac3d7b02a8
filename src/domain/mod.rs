// src/domain/mod.rs
//
// Persisted domain records

pub mod person;

pub use person::{Person, PersonStore};
