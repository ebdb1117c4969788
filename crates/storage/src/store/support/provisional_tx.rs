#![forbid(unsafe_code)]

use super::super::StoreError;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rv_core::model::{
    BranchId, DirectoryId, DirectoryLocationId, ProvisionalDirectoryLocation,
    ProvisionalLocationId, ProvisionalParent, UserId,
};

const PROVISIONAL_COLUMNS: &str = "id, directory_id, branch_id, user_id, parent_location_id, parent_provisional_id, segment_name, appended_path, promoted_location_id, discarded";

/// A provisional row and, once spliced, the real location it became.
#[derive(Debug)]
pub(in crate::store) struct ProvisionalRow {
    pub(in crate::store) record: ProvisionalDirectoryLocation,
    pub(in crate::store) promoted_location_id: Option<DirectoryLocationId>,
    pub(in crate::store) discarded: bool,
}

fn provisional_from_row(row: &Row<'_>) -> rusqlite::Result<ProvisionalRow> {
    let parent = match (
        row.get::<_, Option<i64>>(4)?,
        row.get::<_, Option<i64>>(5)?,
    ) {
        (Some(location), None) => ProvisionalParent::Location(DirectoryLocationId::new(location)),
        (None, Some(provisional)) => {
            ProvisionalParent::Provisional(ProvisionalLocationId::new(provisional))
        }
        _ => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                4,
                Type::Integer,
                "provisional location must have exactly one parent".into(),
            ));
        }
    };
    Ok(ProvisionalRow {
        record: ProvisionalDirectoryLocation {
            id: ProvisionalLocationId::new(row.get(0)?),
            directory_id: row.get::<_, Option<i64>>(1)?.map(DirectoryId::new),
            branch_id: BranchId::new(row.get(2)?),
            user_id: UserId::new(row.get(3)?),
            parent,
            segment_name: row.get(6)?,
            appended_path: row.get(7)?,
        },
        promoted_location_id: row
            .get::<_, Option<i64>>(8)?
            .map(DirectoryLocationId::new),
        discarded: row.get::<_, i64>(9)? != 0,
    })
}

pub(in crate::store) struct NewProvisional<'a> {
    pub(in crate::store) directory_id: Option<DirectoryId>,
    pub(in crate::store) branch_id: BranchId,
    pub(in crate::store) user_id: UserId,
    pub(in crate::store) parent: ProvisionalParent,
    pub(in crate::store) segment_name: &'a str,
    pub(in crate::store) appended_path: &'a str,
}

pub(in crate::store) fn provisional_insert_tx(
    conn: &Connection,
    provisional: &NewProvisional<'_>,
) -> Result<ProvisionalLocationId, StoreError> {
    let (parent_location, parent_provisional) = match provisional.parent {
        ProvisionalParent::Location(id) => (Some(id.get()), None),
        ProvisionalParent::Provisional(id) => (None, Some(id.get())),
    };
    conn.execute(
        "INSERT INTO provisional_directory_locations(directory_id, branch_id, user_id, parent_location_id, parent_provisional_id, segment_name, appended_path) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            provisional.directory_id.map(DirectoryId::get),
            provisional.branch_id.get(),
            provisional.user_id.get(),
            parent_location,
            parent_provisional,
            provisional.segment_name,
            provisional.appended_path,
        ],
    )?;
    Ok(ProvisionalLocationId::new(conn.last_insert_rowid()))
}

pub(in crate::store) fn provisional_find_tx(
    conn: &Connection,
    id: ProvisionalLocationId,
) -> Result<Option<ProvisionalRow>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {PROVISIONAL_COLUMNS} FROM provisional_directory_locations WHERE id=?1"
            ),
            params![id.get()],
            provisional_from_row,
        )
        .optional()?)
}

/// A still-pending record of the user for the same target path.
pub(in crate::store) fn provisional_find_pending_by_path_tx(
    conn: &Connection,
    user_id: UserId,
    branch_id: BranchId,
    appended_path: &str,
) -> Result<Option<ProvisionalRow>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {PROVISIONAL_COLUMNS} FROM provisional_directory_locations \
                 WHERE user_id=?1 AND branch_id=?2 AND appended_path=?3 \
                   AND promoted_location_id IS NULL AND discarded=0 \
                 ORDER BY id LIMIT 1"
            ),
            params![user_id.get(), branch_id.get(), appended_path],
            provisional_from_row,
        )
        .optional()?)
}

pub(in crate::store) fn provisional_mark_promoted_tx(
    conn: &Connection,
    id: ProvisionalLocationId,
    location_id: DirectoryLocationId,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE provisional_directory_locations SET promoted_location_id=?2 WHERE id=?1",
        params![id.get(), location_id.get()],
    )?;
    Ok(())
}

/// Marks every pending record of the user discarded. Returns how many changed.
pub(in crate::store) fn provisional_discard_for_user_tx(
    conn: &Connection,
    user_id: UserId,
) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "UPDATE provisional_directory_locations SET discarded=1 \
         WHERE user_id=?1 AND promoted_location_id IS NULL AND discarded=0",
        params![user_id.get()],
    )?)
}
