#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        -- revision_data holds full content while reverse_delta_revision_id is NULL,
        -- otherwise the edit script that rebuilds this revision from its successor.
        CREATE TABLE IF NOT EXISTS file_revisions (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          branch_id INTEGER NOT NULL REFERENCES branches(id),
          file_id INTEGER NOT NULL REFERENCES files(id),
          ancestor_revision_id INTEGER REFERENCES file_revisions(id),
          reverse_delta_revision_id INTEGER REFERENCES file_revisions(id),
          commit_id INTEGER NOT NULL REFERENCES commits(id),
          promoted INTEGER NOT NULL DEFAULT 0,
          workfile_edit_ms INTEGER NOT NULL,
          digest BLOB NOT NULL,
          revision_data BLOB NOT NULL,
          CHECK(reverse_delta_revision_id IS NULL OR reverse_delta_revision_id > id)
        );
"#;
