#![forbid(unsafe_code)]

//! Per-process services and per-request state.

mod digest;
mod provisional;
mod transactions;

pub use digest::RevisionDigest;
pub use provisional::ProvisionalTracker;
pub(crate) use provisional::TrackerChange;
pub use transactions::{TransactionEnd, TransactionManager, TransactionParticipant};

use crate::{SqliteStore, StoreConfig, StoreError};
use rv_core::model::{CommitId, ConnectionKey, UserId};
use std::sync::Arc;

/// Shared services handed to every worker. Cloning is cheap.
#[derive(Clone, Debug)]
pub struct ServiceContext {
    inner: Arc<Services>,
}

#[derive(Debug)]
struct Services {
    config: StoreConfig,
    transactions: TransactionManager,
    provisional: ProvisionalTracker,
    digest: RevisionDigest,
}

impl ServiceContext {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Services {
                config,
                transactions: TransactionManager::new(),
                provisional: ProvisionalTracker::new(),
                digest: RevisionDigest::new(),
            }),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.inner.transactions
    }

    pub fn provisional(&self) -> &ProvisionalTracker {
        &self.inner.provisional
    }

    pub fn digest(&self) -> &RevisionDigest {
        &self.inner.digest
    }

    /// A fresh request scope on a newly allocated connection key.
    pub fn request_context(&self, user_id: UserId) -> RequestContext {
        RequestContext::new(user_id, self.transactions().allocate_connection_key())
    }

    /// Opens one store (one database connection) for a worker.
    pub fn open_store(&self) -> Result<SqliteStore, StoreError> {
        SqliteStore::open_with(self.clone())
    }
}

/// State scoped to one client connection: who is acting, the commit id
/// shared by every mutation of the current client transaction, and the
/// tracker updates waiting for that transaction to commit.
#[derive(Clone, Debug)]
pub struct RequestContext {
    user_id: UserId,
    connection_key: ConnectionKey,
    pending_commit_id: Option<CommitId>,
    tracker_changes: Vec<TrackerChange>,
}

impl RequestContext {
    pub fn new(user_id: UserId, connection_key: ConnectionKey) -> Self {
        Self {
            user_id,
            connection_key,
            pending_commit_id: None,
            tracker_changes: Vec::new(),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn connection_key(&self) -> ConnectionKey {
        self.connection_key
    }

    pub fn pending_commit_id(&self) -> Option<CommitId> {
        self.pending_commit_id
    }

    pub(crate) fn set_pending_commit_id(&mut self, commit_id: CommitId) {
        self.pending_commit_id = Some(commit_id);
    }

    pub(crate) fn clear_pending_commit_id(&mut self) {
        self.pending_commit_id = None;
    }

    pub(crate) fn defer_tracker_change(&mut self, change: TrackerChange) {
        self.tracker_changes.push(change);
    }

    pub(crate) fn take_tracker_changes(&mut self) -> Vec<TrackerChange> {
        std::mem::take(&mut self.tracker_changes)
    }

    /// Tracker updates still waiting for the client transaction to commit.
    pub fn deferred_tracker_changes(&self) -> usize {
        self.tracker_changes.len()
    }
}
