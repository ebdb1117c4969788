#![forbid(unsafe_code)]

use super::*;
use crate::session::{RequestContext, TrackerChange, TransactionEnd, TransactionParticipant};
use tracing::{debug, error, info, warn};

impl SqliteStore {
    /// Client "begin" marker. Markers nest; only the outermost end commits.
    pub fn begin_client_transaction(&mut self, ctx: &RequestContext) -> u32 {
        self.services
            .transactions()
            .begin_transaction(ctx.connection_key())
    }

    pub fn end_client_transaction(
        &mut self,
        ctx: &mut RequestContext,
    ) -> Result<TransactionEnd, StoreError> {
        let end = self
            .services
            .transactions()
            .end_transaction(ctx.connection_key());
        match end {
            TransactionEnd::Completed { enlisted: true } => self.commit_pending_changes(ctx)?,
            TransactionEnd::Completed { enlisted: false } => {
                ctx.clear_pending_commit_id();
                ctx.take_tracker_changes();
            }
            TransactionEnd::StillOpen { .. } | TransactionEnd::NotInProgress => {}
        }
        Ok(end)
    }

    /// The client connection went away: discard whatever the transaction wrote.
    pub fn flush_client_transaction(&mut self, ctx: &mut RequestContext) -> Result<(), StoreError> {
        let flushed = self.services.transactions().flush(ctx.connection_key());
        if flushed == Some(true) {
            self.rollback_pending_changes(ctx)?;
        }
        ctx.clear_pending_commit_id();
        ctx.take_tracker_changes();
        Ok(())
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Applies a tracker update now, or holds it on the request until the
    /// client transaction commits.
    pub(super) fn update_tracker(&self, ctx: &mut RequestContext, change: TrackerChange) {
        if self
            .services
            .transactions()
            .transaction_is_in_progress(ctx.connection_key())
        {
            ctx.defer_tracker_change(change);
        } else {
            self.services.provisional().apply([change]);
        }
    }
}

impl TransactionParticipant for SqliteStore {
    fn commit_pending_changes(&mut self, ctx: &mut RequestContext) -> Result<(), StoreError> {
        let commit_id = ctx.pending_commit_id();
        ctx.clear_pending_commit_id();
        let tracker_changes = ctx.take_tracker_changes();
        if self.conn.is_autocommit() {
            return Ok(());
        }
        if let Err(err) = self.conn.execute_batch("COMMIT") {
            warn!(error = %err, "client transaction commit failed; rolling back");
            if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                error!(
                    connection = ctx.connection_key().get(),
                    error = %rollback,
                    "rollback after failed commit failed"
                );
            }
            return Err(err.into());
        }
        self.services.provisional().apply(tracker_changes);
        info!(
            connection = ctx.connection_key().get(),
            commit_id = commit_id.map(|id| id.get()),
            "client transaction committed"
        );
        Ok(())
    }

    fn rollback_pending_changes(&mut self, ctx: &mut RequestContext) -> Result<(), StoreError> {
        ctx.clear_pending_commit_id();
        ctx.take_tracker_changes();
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.conn.execute_batch("ROLLBACK")?;
        debug!(
            connection = ctx.connection_key().get(),
            "client transaction rolled back"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rv_core::model::{ProvisionalParent, UserId};

    #[test]
    fn a_failed_commit_rolls_back_and_drops_tracker_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open(dir.path()).unwrap();
        let mut ctx = store.services().request_context(UserId::new(1));
        let project = store.create_project(&mut ctx, "commit").unwrap();

        store.begin_client_transaction(&ctx);
        store
            .add_provisional_directory(
                &mut ctx,
                &AddProvisionalDirectoryRequest {
                    branch_id: project.trunk_branch_id,
                    parent: ProvisionalParent::Location(project.root_location_id),
                    segment_name: "x".to_string(),
                    directory_id: None,
                },
            )
            .unwrap();
        // A deferred foreign key violation makes COMMIT itself fail.
        store
            .conn
            .execute_batch(
                "PRAGMA defer_foreign_keys = ON; \
                 INSERT INTO projects(name, commit_id) VALUES ('dangling', 999999);",
            )
            .unwrap();

        let err = store.end_client_transaction(&mut ctx).unwrap_err();
        assert!(matches!(err, StoreError::Sql(_)));
        assert!(!store.has_pending_changes());
        assert_eq!(ctx.deferred_tracker_changes(), 0);
        assert!(store.pending_provisional_directories(ctx.user_id()).is_empty());
        assert!(store.find_project("dangling").unwrap().is_none());
    }
}
