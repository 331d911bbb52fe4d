//! Tracks in-flight asynchronous command tasks so a client `close()`
//! can cancel every pending callback immediately instead of letting
//! them trickle in against torn-down pools.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::task::AbortHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(pub u64);

#[derive(Default)]
pub struct CallbackRegistry {
    inflight: DashMap<u64, AbortHandle>,
    next: AtomicU64,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh id and records `handle` against it.
    pub fn register(&self, handle: AbortHandle) -> CallbackId {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.inflight.insert(id, handle);
        CallbackId(id)
    }

    /// Allocates a fresh id without an abort handle yet, for callers
    /// that need the id before the task exists to hand back an
    /// `AbortHandle` (the task itself needs to know its own id).
    pub fn reserve(&self) -> CallbackId {
        CallbackId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Records `handle` against a previously `reserve`d id.
    pub fn attach(&self, id: CallbackId, handle: AbortHandle) {
        self.inflight.insert(id.0, handle);
    }

    /// Removes the bookkeeping entry once the task has delivered its
    /// result; a no-op if `close()` already aborted and cleared it.
    pub fn complete(&self, id: CallbackId) {
        self.inflight.remove(&id.0);
    }

    /// Aborts every still-running command task. Called once, from
    /// `Client::close`.
    pub fn abort_all(&self) {
        for entry in self.inflight.iter() {
            entry.value().abort();
        }
        self.inflight.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn complete_removes_entry() {
        let registry = CallbackRegistry::new();
        let handle = tokio::spawn(async { tokio::time::sleep(std::time::Duration::from_secs(10)).await });
        let id = registry.register(handle.abort_handle());
        registry.complete(id);
        assert!(registry.inflight.is_empty());
        handle.abort();
    }

    #[tokio::test]
    async fn abort_all_cancels_pending_tasks() {
        let registry = CallbackRegistry::new();
        let handle = tokio::spawn(async { tokio::time::sleep(std::time::Duration::from_secs(10)).await });
        registry.register(handle.abort_handle());
        registry.abort_all();
        let result = handle.await;
        assert!(result.unwrap_err().is_cancelled());
    }
}
