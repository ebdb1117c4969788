#![forbid(unsafe_code)]

use parking_lot::Mutex;
use rv_core::model::{ProvisionalDirectoryLocation, ProvisionalLocationId, UserId};
use std::collections::{BTreeMap, HashMap};

/// A tracker update held back until the storage work behind it commits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum TrackerChange {
    Track(ProvisionalDirectoryLocation),
    Remove(UserId, ProvisionalLocationId),
    DiscardUser(UserId),
}

/// Process-wide view of each user's pending provisional directory locations.
/// The database is the durable record; this map holds only what is still pending.
#[derive(Debug, Default)]
pub struct ProvisionalTracker {
    by_user: Mutex<HashMap<UserId, BTreeMap<ProvisionalLocationId, ProvisionalDirectoryLocation>>>,
}

impl ProvisionalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, record: ProvisionalDirectoryLocation) {
        self.by_user
            .lock()
            .entry(record.user_id)
            .or_default()
            .insert(record.id, record);
    }

    /// Pending records for a user, oldest first.
    pub fn pending_for_user(&self, user_id: UserId) -> Vec<ProvisionalDirectoryLocation> {
        self.by_user
            .lock()
            .get(&user_id)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn remove(
        &self,
        user_id: UserId,
        id: ProvisionalLocationId,
    ) -> Option<ProvisionalDirectoryLocation> {
        let mut by_user = self.by_user.lock();
        let records = by_user.get_mut(&user_id)?;
        let removed = records.remove(&id);
        if records.is_empty() {
            by_user.remove(&user_id);
        }
        removed
    }

    /// Drops every pending record of the user and returns how many there were.
    pub fn discard_user(&self, user_id: UserId) -> usize {
        self.by_user
            .lock()
            .remove(&user_id)
            .map_or(0, |records| records.len())
    }

    pub fn tracked_users(&self) -> usize {
        self.by_user.lock().len()
    }

    pub(crate) fn apply(&self, changes: impl IntoIterator<Item = TrackerChange>) {
        for change in changes {
            match change {
                TrackerChange::Track(record) => self.track(record),
                TrackerChange::Remove(user_id, id) => {
                    self.remove(user_id, id);
                }
                TrackerChange::DiscardUser(user_id) => {
                    self.discard_user(user_id);
                }
            }
        }
    }
}
