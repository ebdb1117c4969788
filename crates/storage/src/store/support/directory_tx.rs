#![forbid(unsafe_code)]

use super::super::StoreError;
use super::unknown_code;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rv_core::model::{
    BranchId, CommitId, CreatedForReason, DirectoryId, DirectoryLocation, DirectoryLocationId,
    ProjectId,
};

const LOCATION_COLUMNS: &str = "id, directory_id, branch_id, parent_location_id, segment_name, created_for_reason, commit_id, deleted";

pub(in crate::store) struct NewLocation<'a> {
    pub(in crate::store) directory_id: DirectoryId,
    pub(in crate::store) branch_id: BranchId,
    pub(in crate::store) parent_location_id: Option<DirectoryLocationId>,
    pub(in crate::store) segment_name: &'a str,
    pub(in crate::store) created_for: Option<CreatedForReason>,
    pub(in crate::store) commit_id: CommitId,
    pub(in crate::store) deleted: bool,
}

fn location_from_row(row: &Row<'_>) -> rusqlite::Result<DirectoryLocation> {
    let created_for = match row.get::<_, Option<i64>>(5)? {
        Some(code) => Some(CreatedForReason::from_code(code).ok_or_else(|| unknown_code(5, code))?),
        None => None,
    };
    Ok(DirectoryLocation {
        id: DirectoryLocationId::new(row.get(0)?),
        directory_id: DirectoryId::new(row.get(1)?),
        branch_id: BranchId::new(row.get(2)?),
        parent_location_id: row
            .get::<_, Option<i64>>(3)?
            .map(DirectoryLocationId::new),
        segment_name: row.get(4)?,
        created_for,
        commit_id: CommitId::new(row.get(6)?),
        deleted: row.get::<_, i64>(7)? != 0,
    })
}

pub(in crate::store) fn directory_insert_tx(
    conn: &Connection,
    project_id: ProjectId,
) -> Result<DirectoryId, StoreError> {
    conn.execute(
        "INSERT INTO directories(project_id) VALUES (?1)",
        params![project_id.get()],
    )?;
    Ok(DirectoryId::new(conn.last_insert_rowid()))
}

pub(in crate::store) fn directory_project_tx(
    conn: &Connection,
    directory_id: DirectoryId,
) -> Result<Option<ProjectId>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT project_id FROM directories WHERE id=?1",
            params![directory_id.get()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .map(ProjectId::new))
}

pub(in crate::store) fn location_insert_tx(
    conn: &Connection,
    location: &NewLocation<'_>,
) -> Result<DirectoryLocationId, StoreError> {
    conn.execute(
        "INSERT INTO directory_locations(directory_id, branch_id, parent_location_id, segment_name, created_for_reason, commit_id, deleted) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            location.directory_id.get(),
            location.branch_id.get(),
            location.parent_location_id.map(DirectoryLocationId::get),
            location.segment_name,
            location.created_for.map(CreatedForReason::code),
            location.commit_id.get(),
            location.deleted,
        ],
    )?;
    Ok(DirectoryLocationId::new(conn.last_insert_rowid()))
}

pub(in crate::store) fn location_find_tx(
    conn: &Connection,
    location_id: DirectoryLocationId,
) -> Result<Option<DirectoryLocation>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {LOCATION_COLUMNS} FROM directory_locations WHERE id=?1"),
            params![location_id.get()],
            location_from_row,
        )
        .optional()?)
}

/// The project root location. Only trunk owns one, and it has no parent.
pub(in crate::store) fn location_find_root_tx(
    conn: &Connection,
    directory_id: DirectoryId,
) -> Result<Option<DirectoryLocation>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {LOCATION_COLUMNS} FROM directory_locations \
                 WHERE directory_id=?1 AND parent_location_id IS NULL ORDER BY id LIMIT 1"
            ),
            params![directory_id.get()],
            location_from_row,
        )
        .optional()?)
}

/// A branch's own child row named `segment` under any location of `parent_directory_id`.
pub(in crate::store) fn location_find_child_on_branch_tx(
    conn: &Connection,
    branch_id: BranchId,
    parent_directory_id: DirectoryId,
    segment: &str,
) -> Result<Option<DirectoryLocation>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT l.id, l.directory_id, l.branch_id, l.parent_location_id, l.segment_name, \
                    l.created_for_reason, l.commit_id, l.deleted \
             FROM directory_locations l \
             JOIN directory_locations p ON p.id = l.parent_location_id \
             WHERE l.branch_id=?1 AND p.directory_id=?2 AND l.segment_name=?3 \
             ORDER BY l.id DESC LIMIT 1",
            params![branch_id.get(), parent_directory_id.get(), segment],
            location_from_row,
        )
        .optional()?)
}

/// The branch's own row for a directory identity, if the branch has one.
pub(in crate::store) fn location_find_by_directory_on_branch_tx(
    conn: &Connection,
    branch_id: BranchId,
    directory_id: DirectoryId,
) -> Result<Option<DirectoryLocation>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {LOCATION_COLUMNS} FROM directory_locations \
                 WHERE branch_id=?1 AND directory_id=?2 ORDER BY id DESC LIMIT 1"
            ),
            params![branch_id.get(), directory_id.get()],
            location_from_row,
        )
        .optional()?)
}

pub(in crate::store) fn location_mark_deleted_tx(
    conn: &Connection,
    location_id: DirectoryLocationId,
    commit_id: CommitId,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE directory_locations SET deleted=1, commit_id=?2 WHERE id=?1",
        params![location_id.get(), commit_id.get()],
    )?;
    Ok(())
}

pub(in crate::store) fn location_undelete_tx(
    conn: &Connection,
    location_id: DirectoryLocationId,
    commit_id: CommitId,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE directory_locations SET deleted=0, commit_id=?2 WHERE id=?1",
        params![location_id.get(), commit_id.get()],
    )?;
    Ok(())
}

pub(in crate::store) fn location_move_tx(
    conn: &Connection,
    location_id: DirectoryLocationId,
    parent_location_id: DirectoryLocationId,
    commit_id: CommitId,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE directory_locations SET parent_location_id=?2, commit_id=?3 WHERE id=?1",
        params![location_id.get(), parent_location_id.get(), commit_id.get()],
    )?;
    Ok(())
}

pub(in crate::store) fn location_rename_tx(
    conn: &Connection,
    location_id: DirectoryLocationId,
    segment: &str,
    commit_id: CommitId,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE directory_locations SET segment_name=?2, commit_id=?3 WHERE id=?1",
        params![location_id.get(), segment, commit_id.get()],
    )?;
    Ok(())
}

/// Hands a location over to the target branch. Only applies while the row
/// still belongs to `from_branch`; returns whether it did.
pub(in crate::store) fn location_promote_to_parent_branch_tx(
    conn: &Connection,
    location_id: DirectoryLocationId,
    from_branch: BranchId,
    to_branch: BranchId,
    commit_id: CommitId,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE directory_locations SET branch_id=?3, commit_id=?4 WHERE id=?1 AND branch_id=?2",
        params![
            location_id.get(),
            from_branch.get(),
            to_branch.get(),
            commit_id.get()
        ],
    )?;
    Ok(changed == 1)
}
