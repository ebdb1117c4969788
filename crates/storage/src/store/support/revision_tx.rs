#![forbid(unsafe_code)]

use super::super::StoreError;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rv_core::model::{BranchId, CommitId, FileId, FileRevision, FileRevisionId};

const REVISION_COLUMNS: &str = "id, branch_id, file_id, ancestor_revision_id, reverse_delta_revision_id, commit_id, promoted, workfile_edit_ms, digest";

pub(in crate::store) struct NewRevision<'a> {
    pub(in crate::store) branch_id: BranchId,
    pub(in crate::store) file_id: FileId,
    pub(in crate::store) ancestor_revision_id: Option<FileRevisionId>,
    pub(in crate::store) commit_id: CommitId,
    pub(in crate::store) workfile_edit_ms: i64,
    pub(in crate::store) digest: &'a [u8],
    pub(in crate::store) data: &'a [u8],
}

/// Revision metadata plus its stored bytes: full content, or the reverse
/// delta against its successor.
#[derive(Debug)]
pub(in crate::store) struct StoredRevision {
    pub(in crate::store) info: FileRevision,
    pub(in crate::store) data: Vec<u8>,
}

fn revision_from_row(row: &Row<'_>) -> rusqlite::Result<FileRevision> {
    Ok(FileRevision {
        id: FileRevisionId::new(row.get(0)?),
        branch_id: BranchId::new(row.get(1)?),
        file_id: FileId::new(row.get(2)?),
        ancestor_revision_id: row.get::<_, Option<i64>>(3)?.map(FileRevisionId::new),
        reverse_delta_revision_id: row.get::<_, Option<i64>>(4)?.map(FileRevisionId::new),
        commit_id: CommitId::new(row.get(5)?),
        promoted: row.get::<_, i64>(6)? != 0,
        workfile_edit_ms: row.get(7)?,
        digest: row.get(8)?,
    })
}

fn stored_revision_from_row(row: &Row<'_>) -> rusqlite::Result<StoredRevision> {
    Ok(StoredRevision {
        info: revision_from_row(row)?,
        data: row.get(9)?,
    })
}

pub(in crate::store) fn revision_insert_tx(
    conn: &Connection,
    revision: &NewRevision<'_>,
) -> Result<FileRevisionId, StoreError> {
    conn.execute(
        "INSERT INTO file_revisions(branch_id, file_id, ancestor_revision_id, commit_id, workfile_edit_ms, digest, revision_data) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            revision.branch_id.get(),
            revision.file_id.get(),
            revision.ancestor_revision_id.map(FileRevisionId::get),
            revision.commit_id.get(),
            revision.workfile_edit_ms,
            revision.digest,
            revision.data,
        ],
    )?;
    Ok(FileRevisionId::new(conn.last_insert_rowid()))
}

pub(in crate::store) fn revision_find_tx(
    conn: &Connection,
    revision_id: FileRevisionId,
) -> Result<Option<FileRevision>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {REVISION_COLUMNS} FROM file_revisions WHERE id=?1"),
            params![revision_id.get()],
            revision_from_row,
        )
        .optional()?)
}

pub(in crate::store) fn revision_find_stored_tx(
    conn: &Connection,
    revision_id: FileRevisionId,
) -> Result<Option<StoredRevision>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {REVISION_COLUMNS}, revision_data FROM file_revisions WHERE id=?1"),
            params![revision_id.get()],
            stored_revision_from_row,
        )
        .optional()?)
}

/// Most recently inserted revision of the file on any branch.
pub(in crate::store) fn revision_newest_all_branches_tx(
    conn: &Connection,
    file_id: FileId,
) -> Result<Option<StoredRevision>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {REVISION_COLUMNS}, revision_data FROM file_revisions \
                 WHERE file_id=?1 ORDER BY id DESC LIMIT 1"
            ),
            params![file_id.get()],
            stored_revision_from_row,
        )
        .optional()?)
}

/// Revisions of a file on one branch, newest first, optionally limited to
/// commits at or before `cutoff`.
pub(in crate::store) fn revisions_on_branch_tx(
    conn: &Connection,
    file_id: FileId,
    branch_id: BranchId,
    cutoff: Option<CommitId>,
) -> Result<Vec<FileRevision>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REVISION_COLUMNS} FROM file_revisions \
         WHERE file_id=?1 AND branch_id=?2 AND (?3 IS NULL OR commit_id <= ?3) \
         ORDER BY id DESC"
    ))?;
    let rows = stmt.query_map(
        params![file_id.get(), branch_id.get(), cutoff.map(CommitId::get)],
        revision_from_row,
    )?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Turns `ancestor` into a reverse delta against `successor`. The pointer is
/// set once; a second attempt is a fatal chain error and changes nothing.
pub(in crate::store) fn revision_link_reverse_delta_tx(
    conn: &Connection,
    ancestor: FileRevisionId,
    successor: FileRevisionId,
    script: &[u8],
) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE file_revisions SET reverse_delta_revision_id=?2, revision_data=?3 \
         WHERE id=?1 AND reverse_delta_revision_id IS NULL",
        params![ancestor.get(), successor.get(), script],
    )?;
    if changed == 1 {
        return Ok(());
    }

    match revision_find_tx(conn, ancestor)? {
        Some(FileRevision {
            reverse_delta_revision_id: Some(existing),
            ..
        }) => Err(StoreError::ReverseDeltaAlreadySet {
            revision_id: ancestor,
            successor_id: existing,
        }),
        Some(_) => Err(StoreError::Invariant(format!(
            "reverse delta link for revision {ancestor} was not applied"
        ))),
        None => Err(StoreError::UnknownId),
    }
}

pub(in crate::store) fn revisions_mark_promoted_tx(
    conn: &Connection,
    file_id: FileId,
    branch_id: BranchId,
) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "UPDATE file_revisions SET promoted=1 WHERE file_id=?1 AND branch_id=?2 AND promoted=0",
        params![file_id.get(), branch_id.get()],
    )?)
}
