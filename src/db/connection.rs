// src/db/connection.rs
//
// Database connection management
//
// PRINCIPLES:
// - One connection per gateway call, opened and closed inside the call
// - No pooling at this layer; whatever pooling exists belongs to the driver
// - Clear error propagation: open failures are Connection, the rest is Query

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OpenFlags};

use crate::error::{DbError, DbResult};

static MEMORY_DB_SEQ: AtomicU64 = AtomicU64::new(0);

/// Where gateway calls open their connections.
///
/// The source is the only state the gateway owns: a file path, or the name of
/// a shared-cache in-memory database. The in-memory variant keeps one anchor
/// connection alive so the database survives between per-call connections.
#[derive(Clone)]
pub struct ConnectionSource {
    inner: Inner,
}

#[derive(Clone)]
enum Inner {
    File(PathBuf),
    Memory {
        uri: String,
        // Held only to keep the shared-cache database alive.
        _anchor: Arc<Mutex<Connection>>,
    },
}

impl ConnectionSource {
    /// A database file on disk. Created on first open if missing.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            inner: Inner::File(path.as_ref().to_path_buf()),
        }
    }

    /// A process-private in-memory database.
    ///
    /// Useful for tests: each call still opens its own connection, but all
    /// connections from this source see the same data.
    pub fn in_memory() -> DbResult<Self> {
        let seq = MEMORY_DB_SEQ.fetch_add(1, Ordering::Relaxed);
        let uri = format!(
            "file:persondb_mem_{}_{}?mode=memory&cache=shared",
            std::process::id(),
            seq
        );
        let anchor = open_uri(&uri)?;
        Ok(Self {
            inner: Inner::Memory {
                uri,
                _anchor: Arc::new(Mutex::new(anchor)),
            },
        })
    }

    /// Opens a fresh connection with the layer's pragmas applied.
    pub fn open(&self) -> DbResult<Connection> {
        let conn = match &self.inner {
            Inner::File(path) => Connection::open(path).map_err(DbError::Connection)?,
            Inner::Memory { uri, .. } => open_uri(uri)?,
        };

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(DbError::Connection)?;

        Ok(conn)
    }
}

fn open_uri(uri: &str) -> DbResult<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;

    Connection::open_with_flags(uri, flags).map_err(DbError::Connection)
}
