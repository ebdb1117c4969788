#![forbid(unsafe_code)]

use super::*;
use crate::session::RequestContext;
use rusqlite::{Savepoint, Transaction, TransactionBehavior};
use rv_core::model::CommitId;
use std::ops::Deref;
use tracing::{debug, error, warn};

/// Borrowed view of the non-connection parts of a store, so helpers can run
/// while the connection is held by an open transaction.
pub(super) struct Engine<'s> {
    pub(super) services: &'s ServiceContext,
    pub(super) delta: &'s DeltaEngine,
}

/// A unit of work: its own immediate transaction, or a savepoint inside the
/// client transaction the connection has joined.
pub(super) enum WorkScope<'c> {
    Standalone(Transaction<'c>),
    Joined(Savepoint<'c>),
}

impl Deref for WorkScope<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            Self::Standalone(tx) => &**tx,
            Self::Joined(sp) => &**sp,
        }
    }
}

impl WorkScope<'_> {
    fn commit(self) -> Result<(), StoreError> {
        match self {
            Self::Standalone(tx) => tx.commit()?,
            Self::Joined(sp) => sp.commit()?,
        }
        Ok(())
    }
}

impl SqliteStore {
    /// Runs `work` atomically. On failure everything it wrote is rolled back
    /// and a commit id it created for the client transaction is forgotten.
    pub(super) fn with_work<T>(
        &mut self,
        ctx: &mut RequestContext,
        operation: &'static str,
        work: impl FnOnce(&Engine<'_>, &Connection, &mut RequestContext) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let (conn, engine) = self.split();
        let had_commit = ctx.pending_commit_id().is_some();

        let result = engine.begin_work(conn, ctx).and_then(|scope| {
            let value = work(&engine, &*scope, ctx)?;
            scope.commit()?;
            Ok(value)
        });

        if let Err(err) = &result {
            if !had_commit {
                ctx.clear_pending_commit_id();
            }
            report_failure(operation, ctx, err);
        }
        result
    }
}

pub(super) fn report_failure(operation: &'static str, ctx: &RequestContext, err: &StoreError) {
    let user_id = ctx.user_id().get();
    if err.is_fatal() {
        error!(operation, user_id, code = err.code(), error = %err, "fatal storage error; operation aborted");
    } else {
        warn!(operation, user_id, code = err.code(), error = %err, "storage operation failed; rolled back");
    }
}

impl Engine<'_> {
    fn begin_work<'c>(
        &self,
        conn: &'c mut Connection,
        ctx: &RequestContext,
    ) -> Result<WorkScope<'c>, StoreError> {
        let transactions = self.services.transactions();
        let key = ctx.connection_key();

        if transactions.transaction_is_in_progress(key) {
            if conn.is_autocommit() {
                conn.execute_batch("BEGIN IMMEDIATE")?;
                transactions.enlist_pending_work(key);
                debug!(connection = key.get(), "connection joined client transaction");
            }
            return Ok(WorkScope::Joined(conn.savepoint()?));
        }

        // Outside a client transaction nothing may be left uncommitted.
        if !conn.is_autocommit() {
            return Err(StoreError::TransactionDiscipline);
        }
        Ok(WorkScope::Standalone(
            conn.transaction_with_behavior(TransactionBehavior::Immediate)?,
        ))
    }

    /// Inside a client transaction every mutation shares one commit, created
    /// lazily. Otherwise a supplied commit id is used, or a new commit made.
    pub(super) fn commit_id_tx(
        &self,
        conn: &Connection,
        ctx: &mut RequestContext,
        supplied: Option<CommitId>,
        message: &str,
    ) -> Result<CommitId, StoreError> {
        if self
            .services
            .transactions()
            .transaction_is_in_progress(ctx.connection_key())
        {
            if let Some(commit_id) = ctx.pending_commit_id() {
                return Ok(commit_id);
            }
            let commit_id = commit_insert_tx(conn, ctx.user_id(), message)?;
            ctx.set_pending_commit_id(commit_id);
            return Ok(commit_id);
        }

        match supplied {
            Some(commit_id) => {
                commit_find_tx(conn, commit_id)?.ok_or(StoreError::UnknownId)?;
                Ok(commit_id)
            }
            None => commit_insert_tx(conn, ctx.user_id(), message),
        }
    }
}
