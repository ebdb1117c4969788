#![forbid(unsafe_code)]

mod core;
mod indexes;
mod provisional;
mod revisions;
mod tree;

pub(super) fn full_schema_sql() -> String {
    let mut sql = String::new();
    sql.push_str(core::SQL);
    sql.push_str(tree::SQL);
    sql.push_str(revisions::SQL);
    sql.push_str(provisional::SQL);
    sql.push_str(indexes::SQL);
    sql
}
