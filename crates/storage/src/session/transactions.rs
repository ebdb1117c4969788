#![forbid(unsafe_code)]

use super::RequestContext;
use crate::StoreError;
use parking_lot::Mutex;
use rv_core::model::ConnectionKey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Something holding uncommitted work for a client transaction.
pub trait TransactionParticipant {
    fn commit_pending_changes(&mut self, ctx: &mut RequestContext) -> Result<(), StoreError>;
    fn rollback_pending_changes(&mut self, ctx: &mut RequestContext) -> Result<(), StoreError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionEnd {
    NotInProgress,
    StillOpen { depth: u32 },
    /// The outermost end marker arrived. `enlisted` tells whether work is pending.
    Completed { enlisted: bool },
}

#[derive(Clone, Copy, Debug, Default)]
struct ClientTransaction {
    depth: u32,
    enlisted: bool,
}

/// Registry of explicit client transactions, keyed by connection.
#[derive(Debug)]
pub struct TransactionManager {
    open: Mutex<HashMap<ConnectionKey, ClientTransaction>>,
    next_key: AtomicU64,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            open: Mutex::new(HashMap::new()),
            next_key: AtomicU64::new(1),
        }
    }

    pub fn allocate_connection_key(&self) -> ConnectionKey {
        ConnectionKey::new(self.next_key.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the nesting depth after the begin marker.
    pub fn begin_transaction(&self, key: ConnectionKey) -> u32 {
        let mut open = self.open.lock();
        let entry = open.entry(key).or_default();
        entry.depth += 1;
        entry.depth
    }

    pub fn transaction_is_in_progress(&self, key: ConnectionKey) -> bool {
        self.open.lock().contains_key(&key)
    }

    /// Marks the connection as holding pending work. False when no transaction is open.
    pub fn enlist_pending_work(&self, key: ConnectionKey) -> bool {
        match self.open.lock().get_mut(&key) {
            Some(entry) => {
                entry.enlisted = true;
                true
            }
            None => false,
        }
    }

    pub fn end_transaction(&self, key: ConnectionKey) -> TransactionEnd {
        let mut open = self.open.lock();
        let Some(entry) = open.get_mut(&key) else {
            return TransactionEnd::NotInProgress;
        };
        entry.depth = entry.depth.saturating_sub(1);
        if entry.depth > 0 {
            return TransactionEnd::StillOpen { depth: entry.depth };
        }
        let enlisted = entry.enlisted;
        open.remove(&key);
        TransactionEnd::Completed { enlisted }
    }

    /// Drops the connection's transaction regardless of depth. Returns whether
    /// work had been enlisted, or `None` when nothing was open.
    pub fn flush(&self, key: ConnectionKey) -> Option<bool> {
        self.open.lock().remove(&key).map(|entry| entry.enlisted)
    }

    pub fn open_transaction_count(&self) -> usize {
        self.open.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_markers_complete_on_the_outermost_end() {
        let manager = TransactionManager::new();
        let key = manager.allocate_connection_key();
        assert!(!manager.transaction_is_in_progress(key));
        assert_eq!(manager.end_transaction(key), TransactionEnd::NotInProgress);

        assert_eq!(manager.begin_transaction(key), 1);
        assert_eq!(manager.begin_transaction(key), 2);
        assert!(manager.enlist_pending_work(key));
        assert_eq!(
            manager.end_transaction(key),
            TransactionEnd::StillOpen { depth: 1 }
        );
        assert!(manager.transaction_is_in_progress(key));
        assert_eq!(
            manager.end_transaction(key),
            TransactionEnd::Completed { enlisted: true }
        );
        assert!(!manager.transaction_is_in_progress(key));
    }

    #[test]
    fn enlisting_requires_an_open_transaction() {
        let manager = TransactionManager::new();
        let key = manager.allocate_connection_key();
        assert!(!manager.enlist_pending_work(key));
        manager.begin_transaction(key);
        assert_eq!(
            manager.end_transaction(key),
            TransactionEnd::Completed { enlisted: false }
        );
    }

    #[test]
    fn flush_discards_any_depth() {
        let manager = TransactionManager::new();
        let key = manager.allocate_connection_key();
        let other = manager.allocate_connection_key();
        assert_ne!(key, other);

        manager.begin_transaction(key);
        manager.begin_transaction(key);
        manager.begin_transaction(other);
        manager.enlist_pending_work(key);
        assert_eq!(manager.flush(key), Some(true));
        assert_eq!(manager.flush(key), None);
        assert_eq!(manager.open_transaction_count(), 1);
        assert!(manager.transaction_is_in_progress(other));
    }
}
