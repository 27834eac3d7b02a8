// src/db/mod.rs
//
// Database module
//
// Provides:
// - Per-call connection management
// - The SQL gateway (blocking + async calling conventions)
// - Cooperative cancellation of in-flight calls
// - Tabular query results

pub mod cancel;
pub mod connection;
pub mod gateway;
pub mod result;

pub use cancel::CancelToken;
pub use connection::ConnectionSource;
pub use gateway::SqlGateway;
pub use result::{QueryResult, RowView};
