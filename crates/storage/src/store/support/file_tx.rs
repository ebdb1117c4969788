#![forbid(unsafe_code)]

use super::super::StoreError;
use super::unknown_code;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rv_core::model::{
    BranchId, CommitId, CreatedForReason, DirectoryId, FileId, FileName, FileNameId, ProjectId,
};

const FILE_NAME_COLUMNS: &str = "id, branch_id, directory_id, file_id, name, created_for_reason, commit_id, promoted, promotion_commit_id, deleted";

pub(in crate::store) struct NewFileName<'a> {
    pub(in crate::store) branch_id: BranchId,
    pub(in crate::store) directory_id: DirectoryId,
    pub(in crate::store) file_id: FileId,
    pub(in crate::store) name: &'a str,
    pub(in crate::store) created_for: Option<CreatedForReason>,
    pub(in crate::store) commit_id: CommitId,
    pub(in crate::store) deleted: bool,
}

fn file_name_from_row(row: &Row<'_>) -> rusqlite::Result<FileName> {
    let created_for = match row.get::<_, Option<i64>>(5)? {
        Some(code) => Some(CreatedForReason::from_code(code).ok_or_else(|| unknown_code(5, code))?),
        None => None,
    };
    Ok(FileName {
        id: FileNameId::new(row.get(0)?),
        branch_id: BranchId::new(row.get(1)?),
        directory_id: DirectoryId::new(row.get(2)?),
        file_id: FileId::new(row.get(3)?),
        name: row.get(4)?,
        created_for,
        commit_id: CommitId::new(row.get(6)?),
        promoted: row.get::<_, i64>(7)? != 0,
        promotion_commit_id: row.get::<_, Option<i64>>(8)?.map(CommitId::new),
        deleted: row.get::<_, i64>(9)? != 0,
    })
}

pub(in crate::store) fn file_insert_tx(
    conn: &Connection,
    project_id: ProjectId,
) -> Result<FileId, StoreError> {
    conn.execute(
        "INSERT INTO files(project_id) VALUES (?1)",
        params![project_id.get()],
    )?;
    Ok(FileId::new(conn.last_insert_rowid()))
}

pub(in crate::store) fn file_exists_tx(conn: &Connection, file_id: FileId) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM files WHERE id=?1",
            params![file_id.get()],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

pub(in crate::store) fn file_name_insert_tx(
    conn: &Connection,
    file_name: &NewFileName<'_>,
) -> Result<FileNameId, StoreError> {
    conn.execute(
        "INSERT INTO file_names(branch_id, directory_id, file_id, name, created_for_reason, commit_id, deleted) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            file_name.branch_id.get(),
            file_name.directory_id.get(),
            file_name.file_id.get(),
            file_name.name,
            file_name.created_for.map(CreatedForReason::code),
            file_name.commit_id.get(),
            file_name.deleted,
        ],
    )?;
    Ok(FileNameId::new(conn.last_insert_rowid()))
}

pub(in crate::store) fn file_name_find_tx(
    conn: &Connection,
    file_name_id: FileNameId,
) -> Result<Option<FileName>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {FILE_NAME_COLUMNS} FROM file_names WHERE id=?1"),
            params![file_name_id.get()],
            file_name_from_row,
        )
        .optional()?)
}

pub(in crate::store) fn file_name_find_in_directory_on_branch_tx(
    conn: &Connection,
    branch_id: BranchId,
    directory_id: DirectoryId,
    name: &str,
) -> Result<Option<FileName>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {FILE_NAME_COLUMNS} FROM file_names \
                 WHERE branch_id=?1 AND directory_id=?2 AND name=?3 AND promoted=0 \
                 ORDER BY id DESC LIMIT 1"
            ),
            params![branch_id.get(), directory_id.get(), name],
            file_name_from_row,
        )
        .optional()?)
}

/// The branch's own unpromoted row for a file identity, if the branch has one.
pub(in crate::store) fn file_name_find_on_branch_tx(
    conn: &Connection,
    branch_id: BranchId,
    file_id: FileId,
) -> Result<Option<FileName>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {FILE_NAME_COLUMNS} FROM file_names \
                 WHERE branch_id=?1 AND file_id=?2 AND promoted=0 ORDER BY id DESC LIMIT 1"
            ),
            params![branch_id.get(), file_id.get()],
            file_name_from_row,
        )
        .optional()?)
}

pub(in crate::store) fn file_name_mark_deleted_tx(
    conn: &Connection,
    file_name_id: FileNameId,
    commit_id: CommitId,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE file_names SET deleted=1, commit_id=?2 WHERE id=?1",
        params![file_name_id.get(), commit_id.get()],
    )?;
    Ok(())
}

/// Clears the deleted flag on a row the caller expects to belong to `branch_id`.
pub(in crate::store) fn file_name_undelete_tx(
    conn: &Connection,
    file_name_id: FileNameId,
    branch_id: BranchId,
    commit_id: CommitId,
) -> Result<(), StoreError> {
    let row = file_name_find_tx(conn, file_name_id)?.ok_or(StoreError::UnknownId)?;
    if row.branch_id != branch_id {
        return Err(StoreError::Invariant(format!(
            "undelete of file name {file_name_id} on branch {branch_id}, but the row belongs to branch {}",
            row.branch_id
        )));
    }
    conn.execute(
        "UPDATE file_names SET deleted=0, commit_id=?2 WHERE id=?1",
        params![file_name_id.get(), commit_id.get()],
    )?;
    Ok(())
}

pub(in crate::store) fn file_name_relocate_tx(
    conn: &Connection,
    file_name_id: FileNameId,
    directory_id: DirectoryId,
    name: &str,
    commit_id: CommitId,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE file_names SET directory_id=?2, name=?3, commit_id=?4 WHERE id=?1",
        params![file_name_id.get(), directory_id.get(), name, commit_id.get()],
    )?;
    Ok(())
}

/// A promoted row stays for history but no longer names a live file on its branch.
pub(in crate::store) fn file_name_mark_promoted_tx(
    conn: &Connection,
    file_name_id: FileNameId,
    promotion_commit_id: CommitId,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE file_names SET promoted=1, deleted=1, promotion_commit_id=?2 WHERE id=?1",
        params![file_name_id.get(), promotion_commit_id.get()],
    )?;
    Ok(())
}
