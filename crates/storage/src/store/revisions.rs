#![forbid(unsafe_code)]

use super::*;
use crate::session::RequestContext;
use rv_core::model::{BranchId, CommitId, FileId, FileRevision, FileRevisionId};
use std::io::Write;
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

impl Engine<'_> {
    /// Appends a revision and turns the file's previous newest revision (on
    /// any branch) into a reverse delta against it. A delta that cannot be
    /// built leaves the ancestor holding full content.
    pub(in crate::store) fn add_revision_tx(
        &self,
        conn: &Connection,
        branch_id: BranchId,
        file_id: FileId,
        content: &[u8],
        commit_id: CommitId,
        workfile_edit_ms: i64,
    ) -> Result<FileRevisionId, StoreError> {
        let ancestor = revision_newest_all_branches_tx(conn, file_id)?;
        if let Some(StoredRevision {
            info:
                FileRevision {
                    id,
                    reverse_delta_revision_id: Some(successor_id),
                    ..
                },
            ..
        }) = &ancestor
        {
            return Err(StoreError::ReverseDeltaAlreadySet {
                revision_id: *id,
                successor_id: *successor_id,
            });
        }

        let digest = self.services.digest().compute(content);
        let revision_id = revision_insert_tx(
            conn,
            &NewRevision {
                branch_id,
                file_id,
                ancestor_revision_id: ancestor.as_ref().map(|stored| stored.info.id),
                commit_id,
                workfile_edit_ms,
                digest: &digest,
                data: content,
            },
        )?;

        let Some(ancestor) = ancestor else {
            debug!(file_id = file_id.get(), revision_id = revision_id.get(), "first revision stored");
            return Ok(revision_id);
        };

        match self.delta.compute_reverse_delta(&ancestor.data, content) {
            Ok(script) => {
                revision_link_reverse_delta_tx(conn, ancestor.info.id, revision_id, &script)?;
                debug!(
                    file_id = file_id.get(),
                    revision_id = revision_id.get(),
                    ancestor_revision_id = ancestor.info.id.get(),
                    full_len = ancestor.data.len(),
                    delta_len = script.len(),
                    "ancestor revision stored as reverse delta"
                );
            }
            Err(err) => {
                warn!(
                    file_id = file_id.get(),
                    revision_id = revision_id.get(),
                    ancestor_revision_id = ancestor.info.id.get(),
                    error = %err,
                    "reverse delta not computed; ancestor keeps full content"
                );
            }
        }
        Ok(revision_id)
    }

    /// Rebuilds a revision's content by walking its reverse-delta chain to
    /// the newest revision and applying the scripts back down.
    pub(in crate::store) fn hydrate_revision_tx(
        &self,
        conn: &Connection,
        revision_id: FileRevisionId,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(mut stored) = revision_find_stored_tx(conn, revision_id)? else {
            return Ok(None);
        };

        let limit = self.services.config().max_delta_chain_depth;
        let mut scripts: Vec<(FileRevisionId, Vec<u8>)> = Vec::new();
        while let Some(successor_id) = stored.info.reverse_delta_revision_id {
            if scripts.len() == limit {
                return Err(StoreError::DeltaChainTooDeep { revision_id, limit });
            }
            let current_id = stored.info.id;
            scripts.push((current_id, stored.data));
            stored = revision_find_stored_tx(conn, successor_id)?.ok_or_else(|| {
                StoreError::Invariant(format!(
                    "revision {current_id} points at missing successor {successor_id}"
                ))
            })?;
        }

        let mut content = stored.data;
        for (id, script) in scripts.iter().rev() {
            content = self
                .delta
                .hydrate(&content, script)
                .map_err(|source| StoreError::Hydration {
                    revision_id: *id,
                    source,
                })?;
        }
        Ok(Some(content))
    }

    /// Newest revision of the file the branch can see: its own first, then
    /// each ancestor's within that ancestor's visible history.
    pub(in crate::store) fn newest_visible_revision_tx(
        &self,
        conn: &Connection,
        branch_id: BranchId,
        file_id: FileId,
    ) -> Result<Option<FileRevision>, StoreError> {
        for visible in self.visible_branches_tx(conn, branch_id)? {
            let revisions = revisions_on_branch_tx(conn, file_id, visible.branch_id, visible.cutoff)?;
            if let Some(newest) = revisions.into_iter().next() {
                return Ok(Some(newest));
            }
        }
        Ok(None)
    }

    /// Re-appends the content `source_branch` sees as a new revision on
    /// `acting_branch`, so structural changes show up in its history.
    pub(in crate::store) fn carry_forward_tx(
        &self,
        conn: &Connection,
        source_branch: BranchId,
        acting_branch: BranchId,
        file_id: FileId,
        commit_id: CommitId,
    ) -> Result<FileRevisionId, StoreError> {
        let newest = self
            .newest_visible_revision_tx(conn, source_branch, file_id)?
            .ok_or_else(|| {
                StoreError::Invariant(format!(
                    "file {file_id} has no revision visible on branch {source_branch}"
                ))
            })?;
        let content = self
            .hydrate_revision_tx(conn, newest.id)?
            .ok_or(StoreError::UnknownId)?;
        self.add_revision_tx(
            conn,
            acting_branch,
            file_id,
            &content,
            commit_id,
            newest.workfile_edit_ms,
        )
    }
}

impl SqliteStore {
    pub fn add_revision(
        &mut self,
        ctx: &mut RequestContext,
        request: &AddRevisionRequest,
    ) -> Result<FileRevisionId, StoreError> {
        self.with_work(ctx, "add_revision", |engine, tx, ctx| {
            writable_branch_tx(tx, request.branch_id)?;
            if !file_exists_tx(tx, request.file_id)? {
                return Err(StoreError::UnknownId);
            }
            let commit_id = engine.commit_id_tx(tx, ctx, request.commit_id, &request.message)?;
            engine.add_revision_tx(
                tx,
                request.branch_id,
                request.file_id,
                &request.content,
                commit_id,
                request.workfile_edit_ms,
            )
        })
    }

    /// Full content of a revision, or `None` when the id is unknown.
    pub fn get_file_revision(
        &self,
        revision_id: FileRevisionId,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        self.engine()
            .hydrate_revision_tx(&self.conn, revision_id)
            .inspect_err(|err| {
                if err.is_fatal() {
                    error!(
                        revision_id = revision_id.get(),
                        code = err.code(),
                        error = %err,
                        "revision content cannot be reconstructed"
                    );
                }
            })
    }

    pub fn file_revision_info(
        &self,
        revision_id: FileRevisionId,
    ) -> Result<Option<FileRevision>, StoreError> {
        revision_find_tx(&self.conn, revision_id)
    }

    pub fn newest_revision_all_branches(
        &self,
        file_id: FileId,
    ) -> Result<Option<FileRevision>, StoreError> {
        Ok(revision_newest_all_branches_tx(&self.conn, file_id)?.map(|stored| stored.info))
    }

    /// Revisions of the file visible on the branch, newest first.
    pub fn file_revision_list(
        &self,
        branch_id: BranchId,
        file_id: FileId,
    ) -> Result<Vec<FileRevision>, StoreError> {
        let mut revisions = Vec::new();
        for visible in self.engine().visible_branches_tx(&self.conn, branch_id)? {
            revisions.extend(revisions_on_branch_tx(
                &self.conn,
                file_id,
                visible.branch_id,
                visible.cutoff,
            )?);
        }
        revisions.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(revisions)
    }

    /// Writes a revision's content to a scratch file in the storage directory.
    /// The file is removed when the handle drops.
    pub fn checkout_revision(
        &self,
        revision_id: FileRevisionId,
    ) -> Result<Option<NamedTempFile>, StoreError> {
        let Some(content) = self.get_file_revision(revision_id)? else {
            return Ok(None);
        };
        let mut file = tempfile::Builder::new()
            .prefix("checkout-")
            .suffix(".rev")
            .tempfile_in(self.storage_dir())?;
        file.write_all(&content)?;
        file.flush()?;
        Ok(Some(file))
    }
}
