#![forbid(unsafe_code)]

use super::*;
use crate::session::RequestContext;
use rv_core::model::{BranchId, CreatedForReason, DirectoryId, FileId, FileName, FileNameId};
use rv_core::names::validate_file_name;
use tracing::debug;

impl Engine<'_> {
    /// The deepest branch's row for a file identity. Promoted rows no longer
    /// speak for their branch and are skipped by the lookup.
    pub(in crate::store) fn effective_file_name_tx(
        &self,
        conn: &Connection,
        branch_id: BranchId,
        file_id: FileId,
    ) -> Result<Option<FileName>, StoreError> {
        for branch in self.branch_ancestry_tx(conn, branch_id)? {
            if let Some(row) = file_name_find_on_branch_tx(conn, branch.id, file_id)? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    /// Deepest-branch-wins lookup of `name` in a directory, shadowing ancestor
    /// rows of files the deeper branch has its own row for. May return a
    /// deleted row.
    pub(in crate::store) fn find_file_name_tx(
        &self,
        conn: &Connection,
        branch_id: BranchId,
        directory_id: DirectoryId,
        name: &str,
    ) -> Result<Option<FileName>, StoreError> {
        let chain = self.branch_ancestry_tx(conn, branch_id)?;
        for (depth, branch) in chain.iter().enumerate() {
            let Some(candidate) =
                file_name_find_in_directory_on_branch_tx(conn, branch.id, directory_id, name)?
            else {
                continue;
            };
            let mut shadowed = false;
            for deeper in &chain[..depth] {
                if file_name_find_on_branch_tx(conn, deeper.id, candidate.file_id)?.is_some() {
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

    fn live_file_name_tx(
        &self,
        conn: &Connection,
        branch_id: BranchId,
        file_name_id: FileNameId,
    ) -> Result<FileName, StoreError> {
        let named = file_name_find_tx(conn, file_name_id)?.ok_or(StoreError::UnknownId)?;
        self.effective_file_name_tx(conn, branch_id, named.file_id)?
            .filter(|row| !row.deleted)
            .ok_or(StoreError::InvalidInput("file does not exist on the branch"))
    }

    /// Moves and/or renames a file on `branch_id`, then records the change
    /// as a carried-forward revision.
    fn relocate_file_tx(
        &self,
        conn: &Connection,
        ctx: &mut RequestContext,
        branch_id: BranchId,
        file_name_id: FileNameId,
        relocation: Relocation<'_>,
    ) -> Result<FileChange, StoreError> {
        let Relocation {
            destination,
            new_name,
            reason,
        } = relocation;
        writable_branch_tx(conn, branch_id)?;
        let current = self.live_file_name_tx(conn, branch_id, file_name_id)?;

        if let Some(directory_id) = destination
            && self.live_location_tx(conn, branch_id, directory_id)?.is_none()
        {
            return Err(StoreError::Invariant(format!(
                "move of file {} into nonexistent directory {directory_id}",
                current.file_id
            )));
        }
        let directory_id = destination.unwrap_or(current.directory_id);
        let name = new_name.unwrap_or(&current.name);
        if let Some(existing) = self.find_file_name_tx(conn, branch_id, directory_id, name)?
            && !existing.deleted
            && existing.file_id != current.file_id
        {
            return Err(StoreError::InvalidInput("a file with that name already exists"));
        }

        let commit_id = self.commit_id_tx(
            conn,
            ctx,
            None,
            &format!("{} {}", reason.as_str(), current.name),
        )?;
        let file_name_id = if current.branch_id == branch_id {
            file_name_relocate_tx(conn, current.id, directory_id, name, commit_id)?;
            current.id
        } else {
            file_name_insert_tx(
                conn,
                &NewFileName {
                    branch_id,
                    directory_id,
                    file_id: current.file_id,
                    name,
                    created_for: Some(reason),
                    commit_id,
                    deleted: false,
                },
            )?
        };
        let revision_id =
            self.carry_forward_tx(conn, branch_id, branch_id, current.file_id, commit_id)?;

        debug!(
            branch_id = branch_id.get(),
            file_id = current.file_id.get(),
            file_name_id = file_name_id.get(),
            reason = reason.as_str(),
            "file relocated"
        );
        Ok(FileChange {
            file_name_id,
            revision_id,
        })
    }
}

struct Relocation<'a> {
    destination: Option<DirectoryId>,
    new_name: Option<&'a str>,
    reason: CreatedForReason,
}

impl SqliteStore {
    /// Adds a file, reusing its identity when the name is known to the branch
    /// as a deleted file.
    pub fn add_file(
        &mut self,
        ctx: &mut RequestContext,
        request: &AddFileRequest,
    ) -> Result<AddedFile, StoreError> {
        validate_file_name(&request.name).map_err(|err| StoreError::InvalidInput(err.message()))?;

        self.with_work(ctx, "add_file", |engine, tx, ctx| {
            let branch = writable_branch_tx(tx, request.branch_id)?;
            if engine
                .live_location_tx(tx, branch.id, request.directory_id)?
                .is_none()
            {
                return Err(StoreError::InvalidInput("directory does not exist on the branch"));
            }

            let existing =
                engine.find_file_name_tx(tx, branch.id, request.directory_id, &request.name)?;
            if existing.as_ref().is_some_and(|row| !row.deleted) {
                return Err(StoreError::InvalidInput("file already exists"));
            }

            let commit_id = engine.commit_id_tx(tx, ctx, request.commit_id, &request.message)?;
            let (file_id, file_name_id) = match existing {
                Some(row) if row.branch_id == branch.id => {
                    file_name_undelete_tx(tx, row.id, branch.id, commit_id)?;
                    (row.file_id, row.id)
                }
                Some(row) => {
                    let file_name_id = file_name_insert_tx(
                        tx,
                        &NewFileName {
                            branch_id: branch.id,
                            directory_id: request.directory_id,
                            file_id: row.file_id,
                            name: &request.name,
                            created_for: None,
                            commit_id,
                            deleted: false,
                        },
                    )?;
                    (row.file_id, file_name_id)
                }
                None => {
                    let file_id = file_insert_tx(tx, branch.project_id)?;
                    let file_name_id = file_name_insert_tx(
                        tx,
                        &NewFileName {
                            branch_id: branch.id,
                            directory_id: request.directory_id,
                            file_id,
                            name: &request.name,
                            created_for: None,
                            commit_id,
                            deleted: false,
                        },
                    )?;
                    (file_id, file_name_id)
                }
            };

            let revision_id = engine.add_revision_tx(
                tx,
                branch.id,
                file_id,
                &request.content,
                commit_id,
                request.workfile_edit_ms,
            )?;
            debug!(
                branch_id = branch.id.get(),
                file_id = file_id.get(),
                revision_id = revision_id.get(),
                "file added"
            );
            Ok(AddedFile {
                file_id,
                file_name_id,
                revision_id,
            })
        })
    }

    /// Deletes a file on the branch. An ancestor's row is left alone and a
    /// deleted row scoped to the branch shadows it instead.
    pub fn delete_file(
        &mut self,
        ctx: &mut RequestContext,
        branch_id: BranchId,
        file_name_id: FileNameId,
    ) -> Result<FileChange, StoreError> {
        self.with_work(ctx, "delete_file", |engine, tx, ctx| {
            writable_branch_tx(tx, branch_id)?;
            let current = engine.live_file_name_tx(tx, branch_id, file_name_id)?;
            let commit_id =
                engine.commit_id_tx(tx, ctx, None, &format!("delete {}", current.name))?;

            let file_name_id = if current.branch_id == branch_id {
                file_name_mark_deleted_tx(tx, current.id, commit_id)?;
                current.id
            } else {
                file_name_insert_tx(
                    tx,
                    &NewFileName {
                        branch_id,
                        directory_id: current.directory_id,
                        file_id: current.file_id,
                        name: &current.name,
                        created_for: Some(CreatedForReason::Delete),
                        commit_id,
                        deleted: true,
                    },
                )?
            };
            let revision_id =
                engine.carry_forward_tx(tx, branch_id, branch_id, current.file_id, commit_id)?;
            Ok(FileChange {
                file_name_id,
                revision_id,
            })
        })
    }

    pub fn move_file(
        &mut self,
        ctx: &mut RequestContext,
        branch_id: BranchId,
        file_name_id: FileNameId,
        destination: DirectoryId,
    ) -> Result<FileChange, StoreError> {
        self.with_work(ctx, "move_file", |engine, tx, ctx| {
            engine.relocate_file_tx(
                tx,
                ctx,
                branch_id,
                file_name_id,
                Relocation {
                    destination: Some(destination),
                    new_name: None,
                    reason: CreatedForReason::Move,
                },
            )
        })
    }

    pub fn rename_file(
        &mut self,
        ctx: &mut RequestContext,
        branch_id: BranchId,
        file_name_id: FileNameId,
        new_name: &str,
    ) -> Result<FileChange, StoreError> {
        validate_file_name(new_name).map_err(|err| StoreError::InvalidInput(err.message()))?;
        self.with_work(ctx, "rename_file", |engine, tx, ctx| {
            engine.relocate_file_tx(
                tx,
                ctx,
                branch_id,
                file_name_id,
                Relocation {
                    destination: None,
                    new_name: Some(new_name),
                    reason: CreatedForReason::Rename,
                },
            )
        })
    }

    pub fn move_and_rename_file(
        &mut self,
        ctx: &mut RequestContext,
        branch_id: BranchId,
        file_name_id: FileNameId,
        destination: DirectoryId,
        new_name: &str,
    ) -> Result<FileChange, StoreError> {
        validate_file_name(new_name).map_err(|err| StoreError::InvalidInput(err.message()))?;
        self.with_work(ctx, "move_and_rename_file", |engine, tx, ctx| {
            engine.relocate_file_tx(
                tx,
                ctx,
                branch_id,
                file_name_id,
                Relocation {
                    destination: Some(destination),
                    new_name: Some(new_name),
                    reason: CreatedForReason::MoveAndRename,
                },
            )
        })
    }

    /// The live file called `name` in a directory, as the branch sees it.
    pub fn find_file_name(
        &self,
        branch_id: BranchId,
        directory_id: DirectoryId,
        name: &str,
    ) -> Result<Option<FileName>, StoreError> {
        Ok(self
            .engine()
            .find_file_name_tx(&self.conn, branch_id, directory_id, name)?
            .filter(|row| !row.deleted))
    }

    pub fn file_name(&self, file_name_id: FileNameId) -> Result<Option<FileName>, StoreError> {
        file_name_find_tx(&self.conn, file_name_id)
    }
}
