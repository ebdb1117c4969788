#![forbid(unsafe_code)]

mod branch_tx;
mod commit_tx;
mod directory_tx;
mod file_tx;
mod provisional_tx;
mod revision_tx;
mod schema;
mod time;

pub(super) use branch_tx::*;
pub(super) use commit_tx::*;
pub(super) use directory_tx::*;
pub(super) use file_tx::*;
pub(super) use provisional_tx::*;
pub(super) use revision_tx::*;
pub(super) use schema::{SCHEMA_VERSION, install_schema, preflight_gate};
pub(super) use time::now_ms;

use rusqlite::types::Type;

/// Maps an unknown enum code in a row to a conversion error on that column.
fn unknown_code(column: usize, code: i64) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Integer,
        format!("unknown code {code}").into(),
    )
}
