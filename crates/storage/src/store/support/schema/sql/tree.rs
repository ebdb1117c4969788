#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS directories (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          project_id INTEGER NOT NULL REFERENCES projects(id)
        );

        -- A directory as seen by one branch. Branch edits insert new rows
        -- (created_for_reason set) instead of touching an ancestor's row.
        CREATE TABLE IF NOT EXISTS directory_locations (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          directory_id INTEGER NOT NULL REFERENCES directories(id),
          branch_id INTEGER NOT NULL REFERENCES branches(id),
          parent_location_id INTEGER REFERENCES directory_locations(id),
          segment_name TEXT NOT NULL,
          created_for_reason INTEGER,
          commit_id INTEGER NOT NULL REFERENCES commits(id),
          deleted INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS files (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          project_id INTEGER NOT NULL REFERENCES projects(id)
        );

        CREATE TABLE IF NOT EXISTS file_names (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          branch_id INTEGER NOT NULL REFERENCES branches(id),
          directory_id INTEGER NOT NULL REFERENCES directories(id),
          file_id INTEGER NOT NULL REFERENCES files(id),
          name TEXT NOT NULL,
          created_for_reason INTEGER,
          commit_id INTEGER NOT NULL REFERENCES commits(id),
          promoted INTEGER NOT NULL DEFAULT 0,
          promotion_commit_id INTEGER REFERENCES commits(id),
          deleted INTEGER NOT NULL DEFAULT 0
        );
"#;
