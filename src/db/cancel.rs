// src/db/cancel.rs
//
// Cooperative cancellation for in-flight gateway calls
//
// A token carries a flag plus the interrupt handles of statements currently
// running under it. `cancel` sets the flag and interrupts those statements;
// the gateway reports the aborted call as `DbError::Cancelled`. The abort is
// best-effort: the single statement's own atomicity decides what a
// half-finished write leaves behind (nothing, for SQLite).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rusqlite::InterruptHandle;

/// Signals cancellation to gateway calls bound to it.
///
/// Clones share the same state. Bind a token with
/// [`SqlGateway::with_cancel`](crate::db::SqlGateway::with_cancel); calls
/// made through the bound gateway observe `cancel` both before opening a
/// connection and mid-statement.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    inflight: Mutex<Vec<(u64, InterruptHandle)>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sets the flag and interrupts every statement currently running under
    /// this token. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let inflight = self
            .inner
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in inflight.iter() {
            handle.interrupt();
        }
    }

    /// Registers a connection's interrupt handle for the duration of one
    /// call. Dropping the guard deregisters it.
    pub(crate) fn register(&self, handle: InterruptHandle) -> InflightGuard {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        // A cancel that raced ahead of registration still lands.
        if self.is_cancelled() {
            handle.interrupt();
        }
        self.inner
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, handle));
        InflightGuard {
            inner: Arc::clone(&self.inner),
            id,
        }
    }
}

pub(crate) struct InflightGuard {
    inner: Arc<Inner>,
    id: u64,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.inner
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_is_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_is_shared_across_clones_and_idempotent() {
        let token = CancelToken::new();
        let clone = token.clone();

        clone.cancel();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_registration_guard_deregisters_on_drop() {
        let token = CancelToken::new();
        let conn = rusqlite::Connection::open_in_memory().unwrap();

        let guard = token.register(conn.get_interrupt_handle());
        assert_eq!(token.inner.inflight.lock().unwrap().len(), 1);

        drop(guard);
        assert!(token.inner.inflight.lock().unwrap().is_empty());
    }
}
