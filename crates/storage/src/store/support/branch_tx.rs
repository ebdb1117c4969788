#![forbid(unsafe_code)]

use super::super::StoreError;
use super::unknown_code;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rv_core::model::{
    Branch, BranchId, BranchType, CommitId, DirectoryId, DirectoryLocationId, Project, ProjectId,
    Tag, TagId,
};

const BRANCH_COLUMNS: &str = "id, project_id, name, branch_type, parent_branch_id, root_directory_id, tag_id, commit_id, deleted";

pub(in crate::store) struct NewBranch<'a> {
    pub(in crate::store) project_id: ProjectId,
    pub(in crate::store) name: &'a str,
    pub(in crate::store) branch_type: BranchType,
    pub(in crate::store) parent_branch_id: Option<BranchId>,
    pub(in crate::store) root_directory_id: DirectoryId,
    pub(in crate::store) tag_id: Option<TagId>,
    pub(in crate::store) commit_id: CommitId,
}

fn branch_from_row(row: &Row<'_>) -> rusqlite::Result<Branch> {
    let code: i64 = row.get(3)?;
    let branch_type = BranchType::from_code(code).ok_or_else(|| unknown_code(3, code))?;
    Ok(Branch {
        id: BranchId::new(row.get(0)?),
        project_id: ProjectId::new(row.get(1)?),
        name: row.get(2)?,
        branch_type,
        parent_branch_id: row.get::<_, Option<i64>>(4)?.map(BranchId::new),
        root_directory_id: DirectoryId::new(row.get(5)?),
        tag_id: row.get::<_, Option<i64>>(6)?.map(TagId::new),
        commit_id: CommitId::new(row.get(7)?),
        deleted: row.get::<_, i64>(8)? != 0,
    })
}

pub(in crate::store) fn branch_insert_tx(
    conn: &Connection,
    branch: &NewBranch<'_>,
) -> Result<BranchId, StoreError> {
    conn.execute(
        "INSERT INTO branches(project_id, name, branch_type, parent_branch_id, root_directory_id, tag_id, commit_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            branch.project_id.get(),
            branch.name,
            branch.branch_type.code(),
            branch.parent_branch_id.map(BranchId::get),
            branch.root_directory_id.get(),
            branch.tag_id.map(TagId::get),
            branch.commit_id.get(),
        ],
    )?;
    Ok(BranchId::new(conn.last_insert_rowid()))
}

pub(in crate::store) fn branch_find_tx(
    conn: &Connection,
    branch_id: BranchId,
) -> Result<Option<Branch>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE id=?1"),
            params![branch_id.get()],
            branch_from_row,
        )
        .optional()?)
}

/// A live branch that accepts writes.
pub(in crate::store) fn writable_branch_tx(
    conn: &Connection,
    branch_id: BranchId,
) -> Result<Branch, StoreError> {
    let branch = branch_find_tx(conn, branch_id)?
        .filter(|branch| !branch.deleted)
        .ok_or(StoreError::UnknownBranch)?;
    if !branch.branch_type.accepts_writes() {
        return Err(StoreError::BranchReadOnly { branch_id });
    }
    Ok(branch)
}

pub(in crate::store) fn branch_find_by_name_tx(
    conn: &Connection,
    project_id: ProjectId,
    name: &str,
) -> Result<Option<Branch>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE project_id=?1 AND name=?2"),
            params![project_id.get(), name],
            branch_from_row,
        )
        .optional()?)
}

pub(in crate::store) fn branch_live_children_tx(
    conn: &Connection,
    branch_id: BranchId,
) -> Result<i64, StoreError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM branches WHERE parent_branch_id=?1 AND deleted=0",
        params![branch_id.get()],
        |row| row.get(0),
    )?)
}

pub(in crate::store) fn branch_mark_deleted_tx(
    conn: &Connection,
    branch_id: BranchId,
) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "UPDATE branches SET deleted=1 WHERE id=?1 AND deleted=0",
        params![branch_id.get()],
    )?)
}

pub(in crate::store) fn tag_insert_tx(
    conn: &Connection,
    branch_id: BranchId,
    commit_id: CommitId,
    text: &str,
    description: &str,
) -> Result<TagId, StoreError> {
    conn.execute(
        "INSERT INTO tags(branch_id, commit_id, tag_text, description) VALUES (?1, ?2, ?3, ?4)",
        params![branch_id.get(), commit_id.get(), text, description],
    )?;
    Ok(TagId::new(conn.last_insert_rowid()))
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: TagId::new(row.get(0)?),
        branch_id: BranchId::new(row.get(1)?),
        commit_id: CommitId::new(row.get(2)?),
        text: row.get(3)?,
        description: row.get(4)?,
    })
}

pub(in crate::store) fn tag_find_tx(
    conn: &Connection,
    tag_id: TagId,
) -> Result<Option<Tag>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, branch_id, commit_id, tag_text, description FROM tags WHERE id=?1",
            params![tag_id.get()],
            tag_from_row,
        )
        .optional()?)
}

pub(in crate::store) fn tag_find_by_text_tx(
    conn: &Connection,
    branch_id: BranchId,
    text: &str,
) -> Result<Option<Tag>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, branch_id, commit_id, tag_text, description FROM tags \
             WHERE branch_id=?1 AND tag_text=?2",
            params![branch_id.get(), text],
            tag_from_row,
        )
        .optional()?)
}

pub(in crate::store) fn project_insert_tx(
    conn: &Connection,
    name: &str,
    commit_id: CommitId,
) -> Result<ProjectId, StoreError> {
    conn.execute(
        "INSERT INTO projects(name, commit_id) VALUES (?1, ?2)",
        params![name, commit_id.get()],
    )?;
    Ok(ProjectId::new(conn.last_insert_rowid()))
}

/// A project joined with its trunk and the trunk's root location.
pub(in crate::store) fn project_find_by_name_tx(
    conn: &Connection,
    name: &str,
) -> Result<Option<Project>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT p.id, p.name, b.id, b.root_directory_id, l.id \
             FROM projects p \
             JOIN branches b ON b.project_id = p.id AND b.parent_branch_id IS NULL \
             JOIN directory_locations l ON l.directory_id = b.root_directory_id \
               AND l.branch_id = b.id AND l.parent_location_id IS NULL \
             WHERE p.name=?1",
            params![name],
            |row| {
                Ok(Project {
                    id: ProjectId::new(row.get(0)?),
                    name: row.get(1)?,
                    trunk_branch_id: BranchId::new(row.get(2)?),
                    root_directory_id: DirectoryId::new(row.get(3)?),
                    root_location_id: DirectoryLocationId::new(row.get(4)?),
                })
            },
        )
        .optional()?)
}
