#![forbid(unsafe_code)]

use super::*;
use crate::session::RequestContext;
use rv_core::model::{
    BranchId, CommitId, CreatedForReason, DirectoryId, DirectoryLocation, DirectoryLocationId,
    ProjectId,
};
use rv_core::names::{split_appended_path, validate_segment};
use std::collections::HashSet;
use tracing::debug;

impl Engine<'_> {
    /// The deepest branch's row for a directory identity.
    pub(in crate::store) fn effective_location_tx(
        &self,
        conn: &Connection,
        branch_id: BranchId,
        directory_id: DirectoryId,
    ) -> Result<Option<DirectoryLocation>, StoreError> {
        for branch in self.branch_ancestry_tx(conn, branch_id)? {
            if let Some(location) = location_find_by_directory_on_branch_tx(conn, branch.id, directory_id)? {
                return Ok(Some(location));
            }
        }
        Ok(None)
    }

    pub(in crate::store) fn live_location_tx(
        &self,
        conn: &Connection,
        branch_id: BranchId,
        directory_id: DirectoryId,
    ) -> Result<Option<DirectoryLocation>, StoreError> {
        Ok(self
            .effective_location_tx(conn, branch_id, directory_id)?
            .filter(|location| !location.deleted))
    }

    /// Deepest-branch-wins child lookup. A candidate found on an ancestor is
    /// skipped when a deeper branch holds its own row for that directory,
    /// since that row moved, renamed or deleted it. Deleted markers are returned.
    pub(in crate::store) fn find_child_location_tx(
        &self,
        conn: &Connection,
        branch_id: BranchId,
        parent_directory_id: DirectoryId,
        segment: &str,
    ) -> Result<Option<DirectoryLocation>, StoreError> {
        let chain = self.branch_ancestry_tx(conn, branch_id)?;
        for (depth, branch) in chain.iter().enumerate() {
            let Some(candidate) =
                location_find_child_on_branch_tx(conn, branch.id, parent_directory_id, segment)?
            else {
                continue;
            };
            let mut shadowed = false;
            for deeper in &chain[..depth] {
                if location_find_by_directory_on_branch_tx(conn, deeper.id, candidate.directory_id)?
                    .is_some()
                {
                    shadowed = true;
                    break;
                }
            }
            if !shadowed {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    pub(in crate::store) fn resolve_path_tx(
        &self,
        conn: &Connection,
        branch_id: BranchId,
        path: &str,
    ) -> Result<Option<DirectoryLocation>, StoreError> {
        let branch = branch_find_tx(conn, branch_id)?.ok_or(StoreError::UnknownBranch)?;
        let segments =
            split_appended_path(path).map_err(|err| StoreError::InvalidInput(err.message()))?;

        let mut current = self
            .live_location_tx(conn, branch_id, branch.root_directory_id)?
            .ok_or_else(|| {
                StoreError::Invariant(format!("branch {branch_id} has no root location"))
            })?;
        for segment in segments {
            match self.find_child_location_tx(conn, branch_id, current.directory_id, segment)? {
                Some(child) if !child.deleted => current = child,
                _ => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// `a/b/c` path of a location row, following raw parent links.
    pub(in crate::store) fn appended_path_tx(
        &self,
        conn: &Connection,
        location: &DirectoryLocation,
    ) -> Result<String, StoreError> {
        let mut segments = Vec::new();
        let mut seen = HashSet::new();
        let mut current = location.clone();
        while let Some(parent_id) = current.parent_location_id {
            if !seen.insert(current.id) {
                return Err(StoreError::Invariant(format!(
                    "directory location {} is its own ancestor",
                    current.id
                )));
            }
            segments.push(current.segment_name.clone());
            current = location_find_tx(conn, parent_id)?.ok_or_else(|| {
                StoreError::Invariant(format!("directory location {parent_id} is missing"))
            })?;
        }
        segments.reverse();
        Ok(segments.join("/"))
    }

    /// Whether `directory_id` is `location` itself or one of its ancestors as
    /// the branch sees them.
    fn is_same_or_ancestor_tx(
        &self,
        conn: &Connection,
        branch_id: BranchId,
        directory_id: DirectoryId,
        location: &DirectoryLocation,
    ) -> Result<bool, StoreError> {
        let mut seen = HashSet::new();
        let mut current = location.clone();
        loop {
            if current.directory_id == directory_id {
                return Ok(true);
            }
            if !seen.insert(current.directory_id) {
                return Err(StoreError::Invariant(format!(
                    "directory {} is its own ancestor on branch {branch_id}",
                    current.directory_id
                )));
            }
            let Some(parent_id) = current.parent_location_id else {
                return Ok(false);
            };
            let parent = location_find_tx(conn, parent_id)?.ok_or_else(|| {
                StoreError::Invariant(format!("directory location {parent_id} is missing"))
            })?;
            current = self
                .effective_location_tx(conn, branch_id, parent.directory_id)?
                .unwrap_or(parent);
        }
    }

    /// Applies a structural directory change on `branch_id`: in place when the
    /// branch owns the row, otherwise as a new branch-scoped row.
    fn rewrite_location_tx(
        &self,
        conn: &Connection,
        branch_id: BranchId,
        current: &DirectoryLocation,
        change: LocationChange<'_>,
        commit_id: CommitId,
    ) -> Result<DirectoryLocation, StoreError> {
        let location_id = if current.branch_id == branch_id {
            match change {
                LocationChange::Delete => location_mark_deleted_tx(conn, current.id, commit_id)?,
                LocationChange::Move(parent) => location_move_tx(conn, current.id, parent, commit_id)?,
                LocationChange::Rename(segment) => {
                    location_rename_tx(conn, current.id, segment, commit_id)?
                }
            }
            current.id
        } else {
            let (parent_location_id, segment_name, reason) = match change {
                LocationChange::Delete => (
                    current.parent_location_id,
                    current.segment_name.as_str(),
                    CreatedForReason::Delete,
                ),
                LocationChange::Move(parent) => (
                    Some(parent),
                    current.segment_name.as_str(),
                    CreatedForReason::Move,
                ),
                LocationChange::Rename(segment) => (
                    current.parent_location_id,
                    segment,
                    CreatedForReason::Rename,
                ),
            };
            location_insert_tx(
                conn,
                &NewLocation {
                    directory_id: current.directory_id,
                    branch_id,
                    parent_location_id,
                    segment_name,
                    created_for: Some(reason),
                    commit_id,
                    deleted: matches!(change, LocationChange::Delete),
                },
            )?
        };

        location_find_tx(conn, location_id)?.ok_or_else(|| {
            StoreError::Invariant(format!("directory location {location_id} vanished"))
        })
    }

    /// The live, non-root location of the directory `location_id` names, as
    /// `branch_id` sees it.
    fn movable_location_tx(
        &self,
        conn: &Connection,
        branch_id: BranchId,
        location_id: DirectoryLocationId,
    ) -> Result<DirectoryLocation, StoreError> {
        let named = location_find_tx(conn, location_id)?.ok_or(StoreError::UnknownId)?;
        let current = self
            .live_location_tx(conn, branch_id, named.directory_id)?
            .ok_or(StoreError::InvalidInput("directory does not exist on the branch"))?;
        if current.parent_location_id.is_none() {
            return Err(StoreError::InvalidInput("the project root cannot be changed"));
        }
        Ok(current)
    }

    fn parent_directory_tx(
        &self,
        conn: &Connection,
        location: &DirectoryLocation,
    ) -> Result<DirectoryId, StoreError> {
        let parent_id = location
            .parent_location_id
            .ok_or(StoreError::InvalidInput("the project root has no parent"))?;
        Ok(location_find_tx(conn, parent_id)?
            .ok_or_else(|| StoreError::Invariant(format!("directory location {parent_id} is missing")))?
            .directory_id)
    }

    fn ensure_segment_free_tx(
        &self,
        conn: &Connection,
        branch_id: BranchId,
        parent_directory_id: DirectoryId,
        segment: &str,
        moving: DirectoryId,
    ) -> Result<(), StoreError> {
        match self.find_child_location_tx(conn, branch_id, parent_directory_id, segment)? {
            Some(existing) if !existing.deleted && existing.directory_id != moving => Err(
                StoreError::InvalidInput("a directory with that name already exists"),
            ),
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Copy)]
enum LocationChange<'a> {
    Delete,
    Move(DirectoryLocationId),
    Rename(&'a str),
}

impl SqliteStore {
    /// Creates (or undeletes) the directory `segment` under `parent_location_id`.
    pub fn add_directory(
        &mut self,
        ctx: &mut RequestContext,
        branch_id: BranchId,
        parent_location_id: DirectoryLocationId,
        segment: &str,
    ) -> Result<DirectoryLocation, StoreError> {
        validate_segment(segment).map_err(|err| StoreError::InvalidInput(err.message()))?;

        self.with_work(ctx, "add_directory", |engine, tx, ctx| {
            let branch = writable_branch_tx(tx, branch_id)?;
            let named_parent =
                location_find_tx(tx, parent_location_id)?.ok_or(StoreError::UnknownId)?;
            let parent = engine
                .live_location_tx(tx, branch_id, named_parent.directory_id)?
                .ok_or(StoreError::InvalidInput(
                    "parent directory does not exist on the branch",
                ))?;

            let existing = engine.find_child_location_tx(tx, branch_id, parent.directory_id, segment)?;
            if existing.as_ref().is_some_and(|location| !location.deleted) {
                return Err(StoreError::InvalidInput("directory already exists"));
            }

            let commit_id =
                engine.commit_id_tx(tx, ctx, None, &format!("add directory {segment}"))?;
            let location_id = match existing {
                Some(marker) if marker.branch_id == branch_id => {
                    location_undelete_tx(tx, marker.id, commit_id)?;
                    marker.id
                }
                Some(marker) => location_insert_tx(
                    tx,
                    &NewLocation {
                        directory_id: marker.directory_id,
                        branch_id,
                        parent_location_id: Some(parent.id),
                        segment_name: segment,
                        created_for: None,
                        commit_id,
                        deleted: false,
                    },
                )?,
                None => {
                    let directory_id = directory_insert_tx(tx, branch.project_id)?;
                    location_insert_tx(
                        tx,
                        &NewLocation {
                            directory_id,
                            branch_id,
                            parent_location_id: Some(parent.id),
                            segment_name: segment,
                            created_for: None,
                            commit_id,
                            deleted: false,
                        },
                    )?
                }
            };

            let location = location_find_tx(tx, location_id)?.ok_or(StoreError::UnknownId)?;
            debug!(
                branch_id = branch_id.get(),
                directory_id = location.directory_id.get(),
                location_id = location.id.get(),
                "directory added"
            );
            Ok(location)
        })
    }

    pub fn delete_directory(
        &mut self,
        ctx: &mut RequestContext,
        branch_id: BranchId,
        location_id: DirectoryLocationId,
    ) -> Result<DirectoryLocation, StoreError> {
        self.with_work(ctx, "delete_directory", |engine, tx, ctx| {
            writable_branch_tx(tx, branch_id)?;
            let current = engine.movable_location_tx(tx, branch_id, location_id)?;
            let commit_id = engine.commit_id_tx(
                tx,
                ctx,
                None,
                &format!("delete directory {}", current.segment_name),
            )?;
            engine.rewrite_location_tx(tx, branch_id, &current, LocationChange::Delete, commit_id)
        })
    }

    /// Moves a directory under another one. The destination must exist on the branch.
    pub fn move_directory(
        &mut self,
        ctx: &mut RequestContext,
        branch_id: BranchId,
        location_id: DirectoryLocationId,
        new_parent_location_id: DirectoryLocationId,
    ) -> Result<DirectoryLocation, StoreError> {
        self.with_work(ctx, "move_directory", |engine, tx, ctx| {
            writable_branch_tx(tx, branch_id)?;
            let current = engine.movable_location_tx(tx, branch_id, location_id)?;

            let destination = location_find_tx(tx, new_parent_location_id)?
                .map(|named| engine.live_location_tx(tx, branch_id, named.directory_id))
                .transpose()?
                .flatten()
                .ok_or_else(|| {
                    StoreError::Invariant(format!(
                        "move of directory {} into nonexistent directory location {new_parent_location_id}",
                        current.directory_id
                    ))
                })?;
            if engine.is_same_or_ancestor_tx(tx, branch_id, current.directory_id, &destination)? {
                return Err(StoreError::InvalidInput(
                    "a directory cannot be moved into itself or its descendants",
                ));
            }
            engine.ensure_segment_free_tx(
                tx,
                branch_id,
                destination.directory_id,
                &current.segment_name,
                current.directory_id,
            )?;

            let commit_id = engine.commit_id_tx(
                tx,
                ctx,
                None,
                &format!("move directory {}", current.segment_name),
            )?;
            engine.rewrite_location_tx(
                tx,
                branch_id,
                &current,
                LocationChange::Move(destination.id),
                commit_id,
            )
        })
    }

    pub fn rename_directory(
        &mut self,
        ctx: &mut RequestContext,
        branch_id: BranchId,
        location_id: DirectoryLocationId,
        new_segment: &str,
    ) -> Result<DirectoryLocation, StoreError> {
        validate_segment(new_segment).map_err(|err| StoreError::InvalidInput(err.message()))?;

        self.with_work(ctx, "rename_directory", |engine, tx, ctx| {
            writable_branch_tx(tx, branch_id)?;
            let current = engine.movable_location_tx(tx, branch_id, location_id)?;
            let parent_directory_id = engine.parent_directory_tx(tx, &current)?;
            engine.ensure_segment_free_tx(
                tx,
                branch_id,
                parent_directory_id,
                new_segment,
                current.directory_id,
            )?;

            let commit_id = engine.commit_id_tx(
                tx,
                ctx,
                None,
                &format!("rename directory {} to {new_segment}", current.segment_name),
            )?;
            engine.rewrite_location_tx(
                tx,
                branch_id,
                &current,
                LocationChange::Rename(new_segment),
                commit_id,
            )
        })
    }

    /// The child `segment` of the directory at `parent_location_id` as the
    /// branch sees it. The result may be a deleted marker.
    pub fn find_child_directory_location(
        &self,
        branch_id: BranchId,
        parent_location_id: DirectoryLocationId,
        segment: &str,
    ) -> Result<Option<DirectoryLocation>, StoreError> {
        let parent = location_find_tx(&self.conn, parent_location_id)?.ok_or(StoreError::UnknownId)?;
        self.engine()
            .find_child_location_tx(&self.conn, branch_id, parent.directory_id, segment)
    }

    /// Resolves `a/b/c` from the project root; `""` is the root itself.
    pub fn find_directory_location_by_appended_path(
        &self,
        branch_id: BranchId,
        path: &str,
    ) -> Result<Option<DirectoryLocation>, StoreError> {
        self.engine().resolve_path_tx(&self.conn, branch_id, path)
    }

    pub fn get_directory_id(
        &self,
        project_id: ProjectId,
        branch_id: BranchId,
        path: &str,
    ) -> Result<Option<DirectoryId>, StoreError> {
        let branch = branch_find_tx(&self.conn, branch_id)?.ok_or(StoreError::UnknownBranch)?;
        if branch.project_id != project_id {
            return Err(StoreError::UnknownBranch);
        }
        Ok(self
            .find_directory_location_by_appended_path(branch_id, path)?
            .map(|location| location.directory_id))
    }

    pub fn directory_location(
        &self,
        location_id: DirectoryLocationId,
    ) -> Result<Option<DirectoryLocation>, StoreError> {
        location_find_tx(&self.conn, location_id)
    }
}
