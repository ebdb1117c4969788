#![forbid(unsafe_code)]

use super::super::StoreError;
use super::now_ms;
use rusqlite::{Connection, OptionalExtension, params};
use rv_core::model::{Commit, CommitId, UserId};

pub(in crate::store) fn commit_insert_tx(
    conn: &Connection,
    user_id: UserId,
    message: &str,
) -> Result<CommitId, StoreError> {
    conn.execute(
        "INSERT INTO commits(user_id, message, committed_at_ms) VALUES (?1, ?2, ?3)",
        params![user_id.get(), message, now_ms()],
    )?;
    Ok(CommitId::new(conn.last_insert_rowid()))
}

pub(in crate::store) fn commit_find_tx(
    conn: &Connection,
    commit_id: CommitId,
) -> Result<Option<Commit>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, user_id, message, committed_at_ms FROM commits WHERE id=?1",
            params![commit_id.get()],
            |row| {
                Ok(Commit {
                    id: CommitId::new(row.get(0)?),
                    user_id: UserId::new(row.get(1)?),
                    message: row.get(2)?,
                    committed_at_ms: row.get(3)?,
                })
            },
        )
        .optional()?)
}
