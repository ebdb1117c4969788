#![forbid(unsafe_code)]

use super::*;
use crate::session::{RequestContext, TrackerChange};
use rv_core::model::{
    BranchId, CommitId, DirectoryLocation, DirectoryLocationId, ProvisionalDirectoryLocation,
    ProvisionalLocationId, ProvisionalParent, ProvisionalState, UserId,
};
use rv_core::names::{join_appended_path, validate_segment};
use std::collections::HashSet;
use tracing::{debug, info};

/// Result of splicing a provisional chain: the real location the requested
/// record now stands for, and each record spliced on the way, parent first.
struct Splice {
    location_id: DirectoryLocationId,
    promoted: Vec<(ProvisionalLocationId, DirectoryLocation)>,
}

impl Engine<'_> {
    /// Splices `provisional_id` and every still-pending provisional parent
    /// into real locations on the target branch, parent before child.
    fn promote_provisional_tx(
        &self,
        conn: &Connection,
        user_id: UserId,
        promoted_from: BranchId,
        provisional_id: ProvisionalLocationId,
        commit_id: CommitId,
    ) -> Result<Splice, StoreError> {
        let mut pending: Vec<ProvisionalDirectoryLocation> = Vec::new();
        let mut seen = HashSet::new();
        let mut next = provisional_id;
        let mut anchor = loop {
            if !seen.insert(next) {
                return Err(StoreError::Invariant(format!(
                    "provisional location {next} is its own ancestor"
                )));
            }
            let row = provisional_find_tx(conn, next)?.ok_or(StoreError::UnknownId)?;
            if row.record.user_id != user_id {
                return Err(StoreError::InvalidInput(
                    "provisional location belongs to another user",
                ));
            }
            if let Some(location_id) = row.promoted_location_id {
                break location_id;
            }
            if row.discarded {
                return Err(StoreError::InvalidInput("provisional location was discarded"));
            }
            let parent = row.record.parent;
            pending.push(row.record);
            match parent {
                ProvisionalParent::Location(location_id) => break location_id,
                ProvisionalParent::Provisional(parent_id) => next = parent_id,
            }
        };

        let mut promoted = Vec::with_capacity(pending.len());
        for record in pending.into_iter().rev() {
            let parent = location_find_tx(conn, anchor)?.ok_or_else(|| {
                StoreError::Invariant(format!(
                    "provisional location {} hangs off missing location {anchor}",
                    record.id
                ))
            })?;
            let location = self.splice_location_tx(conn, &record, promoted_from, &parent, commit_id)?;
            provisional_mark_promoted_tx(conn, record.id, location.id)?;
            debug!(
                provisional_id = record.id.get(),
                location_id = location.id.get(),
                branch_id = record.branch_id.get(),
                "provisional directory spliced"
            );
            anchor = location.id;
            promoted.push((record.id, location));
        }

        Ok(Splice {
            location_id: anchor,
            promoted,
        })
    }

    /// The real location for one provisional record. An existing live child
    /// on the target branch is reused; the source branch's own location is
    /// handed over; otherwise a new location is created.
    fn splice_location_tx(
        &self,
        conn: &Connection,
        record: &ProvisionalDirectoryLocation,
        promoted_from: BranchId,
        parent: &DirectoryLocation,
        commit_id: CommitId,
    ) -> Result<DirectoryLocation, StoreError> {
        let target = record.branch_id;
        let source = branch_find_tx(conn, promoted_from)?.ok_or(StoreError::UnknownBranch)?;
        if source.parent_branch_id != Some(target) {
            return Err(StoreError::InvalidInput(
                "promotion target must be the parent of the source branch",
            ));
        }

        if let Some(existing) =
            self.find_child_location_tx(conn, target, parent.directory_id, &record.segment_name)?
            && !existing.deleted
        {
            return Ok(existing);
        }

        let directory_id = match record.directory_id {
            Some(directory_id) => {
                if let Some(owned) =
                    location_find_by_directory_on_branch_tx(conn, promoted_from, directory_id)?
                    && location_promote_to_parent_branch_tx(
                        conn,
                        owned.id,
                        promoted_from,
                        target,
                        commit_id,
                    )?
                {
                    if owned.parent_location_id != Some(parent.id) {
                        location_move_tx(conn, owned.id, parent.id, commit_id)?;
                    }
                    if owned.segment_name != record.segment_name {
                        location_rename_tx(conn, owned.id, &record.segment_name, commit_id)?;
                    }
                    return location_find_tx(conn, owned.id)?.ok_or(StoreError::UnknownId);
                }
                directory_id
            }
            None => {
                let project_id = directory_project_tx(conn, parent.directory_id)?
                    .ok_or(StoreError::UnknownProject)?;
                directory_insert_tx(conn, project_id)?
            }
        };

        let location_id = location_insert_tx(
            conn,
            &NewLocation {
                directory_id,
                branch_id: target,
                parent_location_id: Some(parent.id),
                segment_name: &record.segment_name,
                created_for: None,
                commit_id,
                deleted: false,
            },
        )?;
        location_find_tx(conn, location_id)?.ok_or(StoreError::UnknownId)
    }
}

impl SqliteStore {
    /// Records a directory that a promotion will need on the target branch.
    /// Asking twice for the same path returns the pending record.
    pub fn add_provisional_directory(
        &mut self,
        ctx: &mut RequestContext,
        request: &AddProvisionalDirectoryRequest,
    ) -> Result<ProvisionalDirectoryLocation, StoreError> {
        validate_segment(&request.segment_name)
            .map_err(|err| StoreError::InvalidInput(err.message()))?;

        let record = self.with_work(ctx, "add_provisional_directory", |engine, tx, ctx| {
            writable_branch_tx(tx, request.branch_id)?;
            let user_id = ctx.user_id();

            let parent_path = match request.parent {
                ProvisionalParent::Location(location_id) => {
                    let location = location_find_tx(tx, location_id)?.ok_or(StoreError::UnknownId)?;
                    engine.appended_path_tx(tx, &location)?
                }
                ProvisionalParent::Provisional(parent_id) => {
                    let parent = provisional_find_tx(tx, parent_id)?.ok_or(StoreError::UnknownId)?;
                    if parent.record.user_id != user_id || parent.record.branch_id != request.branch_id {
                        return Err(StoreError::InvalidInput(
                            "provisional parent belongs to another user or branch",
                        ));
                    }
                    if parent.discarded {
                        return Err(StoreError::InvalidInput("provisional parent was discarded"));
                    }
                    parent.record.appended_path
                }
            };
            let appended_path = join_appended_path(&parent_path, &request.segment_name);

            if let Some(existing) =
                provisional_find_pending_by_path_tx(tx, user_id, request.branch_id, &appended_path)?
            {
                return Ok(existing.record);
            }

            let id = provisional_insert_tx(
                tx,
                &NewProvisional {
                    directory_id: request.directory_id,
                    branch_id: request.branch_id,
                    user_id,
                    parent: request.parent,
                    segment_name: &request.segment_name,
                    appended_path: &appended_path,
                },
            )?;
            Ok(provisional_find_tx(tx, id)?
                .ok_or(StoreError::UnknownId)?
                .record)
        })?;

        debug!(
            user_id = record.user_id.get(),
            provisional_id = record.id.get(),
            path = record.appended_path.as_str(),
            "provisional directory pending"
        );
        self.update_tracker(ctx, TrackerChange::Track(record.clone()));
        Ok(record)
    }

    /// Splices a provisional directory (and its pending parents) into the
    /// branch it was recorded for. Returns the locations created or taken
    /// over, parent first, for notification.
    pub fn mark_promoted(
        &mut self,
        ctx: &mut RequestContext,
        promoted_from: BranchId,
        provisional_id: ProvisionalLocationId,
    ) -> Result<Vec<DirectoryLocation>, StoreError> {
        let user_id = ctx.user_id();
        let splice = self.with_work(ctx, "mark_promoted", |engine, tx, ctx| {
            let commit_id = engine.commit_id_tx(tx, ctx, None, "promote directories")?;
            engine.promote_provisional_tx(tx, user_id, promoted_from, provisional_id, commit_id)
        })?;
        Ok(self.forget_promoted(ctx, splice.promoted))
    }

    /// Promotes a file created on a child branch into its parent branch.
    pub fn promote_file_create(
        &mut self,
        ctx: &mut RequestContext,
        request: &PromoteFileCreateRequest,
    ) -> Result<PromotedFile, StoreError> {
        let user_id = ctx.user_id();
        let (file_name_id, revision_id, promoted) =
            self.with_work(ctx, "promote_file_create", |engine, tx, ctx| {
                let source = file_name_find_tx(tx, request.file_name_id)?
                    .filter(|row| !row.deleted && !row.promoted)
                    .ok_or(StoreError::InvalidInput("file is not live on its branch"))?;
                let source_branch =
                    branch_find_tx(tx, source.branch_id)?.ok_or(StoreError::UnknownBranch)?;
                let target = source_branch.parent_branch_id.ok_or(StoreError::InvalidInput(
                    "the trunk has no parent branch to promote into",
                ))?;
                writable_branch_tx(tx, target)?;
                let commit_id = engine.commit_id_tx(
                    tx,
                    ctx,
                    None,
                    &format!("promote {}", source.name),
                )?;

                let (location_id, promoted) = match request.destination {
                    ProvisionalParent::Location(location_id) => (location_id, Vec::new()),
                    ProvisionalParent::Provisional(provisional_id) => {
                        let splice = engine.promote_provisional_tx(
                            tx,
                            user_id,
                            source_branch.id,
                            provisional_id,
                            commit_id,
                        )?;
                        (splice.location_id, splice.promoted)
                    }
                };
                let directory = location_find_tx(tx, location_id)?
                    .map(|named| engine.live_location_tx(tx, target, named.directory_id))
                    .transpose()?
                    .flatten()
                    .ok_or_else(|| {
                        StoreError::Invariant(format!(
                            "promotion of file {} into nonexistent directory location {location_id}",
                            source.file_id
                        ))
                    })?;

                if engine
                    .find_file_name_tx(tx, target, directory.directory_id, &source.name)?
                    .is_some_and(|row| !row.deleted)
                {
                    return Err(StoreError::InvalidInput(
                        "a file with that name already exists on the parent branch",
                    ));
                }

                let file_name_id = file_name_insert_tx(
                    tx,
                    &NewFileName {
                        branch_id: target,
                        directory_id: directory.directory_id,
                        file_id: source.file_id,
                        name: &source.name,
                        created_for: None,
                        commit_id,
                        deleted: false,
                    },
                )?;
                file_name_mark_promoted_tx(tx, source.id, commit_id)?;
                revisions_mark_promoted_tx(tx, source.file_id, source_branch.id)?;
                let revision_id = engine.carry_forward_tx(
                    tx,
                    source_branch.id,
                    target,
                    source.file_id,
                    commit_id,
                )?;
                Ok((file_name_id, revision_id, promoted))
            })?;

        let directories = self.forget_promoted(ctx, promoted);
        info!(
            file_name_id = file_name_id.get(),
            revision_id = revision_id.get(),
            directories = directories.len(),
            "file promoted to parent branch"
        );
        Ok(PromotedFile {
            file_name_id,
            revision_id,
            directories,
        })
    }

    /// Abandons every pending provisional record of the user. Returns how
    /// many were discarded.
    pub fn delete_provisional_records(
        &mut self,
        ctx: &mut RequestContext,
    ) -> Result<usize, StoreError> {
        let user_id = ctx.user_id();
        let discarded = self.with_work(ctx, "delete_provisional_records", |_engine, tx, _ctx| {
            provisional_discard_for_user_tx(tx, user_id)
        })?;
        self.update_tracker(ctx, TrackerChange::DiscardUser(user_id));
        debug!(user_id = user_id.get(), discarded, "provisional records discarded");
        Ok(discarded)
    }

    pub fn provisional_state(
        &self,
        user_id: UserId,
        provisional_id: ProvisionalLocationId,
    ) -> Result<ProvisionalState, StoreError> {
        Ok(match provisional_find_tx(&self.conn, provisional_id)? {
            Some(row) if row.record.user_id == user_id => match row.promoted_location_id {
                Some(location_id) => ProvisionalState::Promoted(location_id),
                None if row.discarded => ProvisionalState::Discarded,
                None => ProvisionalState::Pending,
            },
            _ => ProvisionalState::Uncreated,
        })
    }

    pub fn pending_provisional_directories(
        &self,
        user_id: UserId,
    ) -> Vec<ProvisionalDirectoryLocation> {
        self.services.provisional().pending_for_user(user_id)
    }

    fn forget_promoted(
        &self,
        ctx: &mut RequestContext,
        promoted: Vec<(ProvisionalLocationId, DirectoryLocation)>,
    ) -> Vec<DirectoryLocation> {
        let user_id = ctx.user_id();
        promoted
            .into_iter()
            .map(|(provisional_id, location)| {
                self.update_tracker(ctx, TrackerChange::Remove(user_id, provisional_id));
                location
            })
            .collect()
    }
}
