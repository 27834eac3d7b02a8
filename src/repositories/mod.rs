// src/repositories/mod.rs
//
// Repository layer
//
// CRITICAL RULES:
// - Stores are DUMB data mappers
// - NO business logic
// - NO cross-store calls
// - Statement skeletons are generated from entity metadata, never from
//   caller-supplied text

pub mod entity;
pub mod entity_store;

pub use entity::{Entity, SQL_NOW};
pub use entity_store::{AsyncEntityStore, EntityStore, SqlEntityStore};
