#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS store_state (
          singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
          schema_version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS commits (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          user_id INTEGER NOT NULL,
          message TEXT NOT NULL,
          committed_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS projects (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL UNIQUE,
          commit_id INTEGER NOT NULL REFERENCES commits(id)
        );

        -- Exactly the trunk has no parent; branch_type 1 is trunk.
        CREATE TABLE IF NOT EXISTS branches (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          project_id INTEGER NOT NULL REFERENCES projects(id),
          name TEXT NOT NULL,
          branch_type INTEGER NOT NULL,
          parent_branch_id INTEGER REFERENCES branches(id),
          root_directory_id INTEGER NOT NULL REFERENCES directories(id),
          tag_id INTEGER REFERENCES tags(id),
          commit_id INTEGER NOT NULL REFERENCES commits(id),
          deleted INTEGER NOT NULL DEFAULT 0,
          UNIQUE(project_id, name),
          CHECK(parent_branch_id IS NULL OR parent_branch_id <> id),
          CHECK((branch_type = 1) = (parent_branch_id IS NULL))
        );

        CREATE TABLE IF NOT EXISTS tags (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          branch_id INTEGER NOT NULL REFERENCES branches(id),
          commit_id INTEGER NOT NULL REFERENCES commits(id),
          tag_text TEXT NOT NULL,
          description TEXT NOT NULL DEFAULT '',
          UNIQUE(branch_id, tag_text)
        );
"#;
