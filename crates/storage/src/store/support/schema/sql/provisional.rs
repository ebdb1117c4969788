#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS provisional_directory_locations (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          directory_id INTEGER REFERENCES directories(id),
          branch_id INTEGER NOT NULL REFERENCES branches(id),
          user_id INTEGER NOT NULL,
          parent_location_id INTEGER REFERENCES directory_locations(id),
          parent_provisional_id INTEGER REFERENCES provisional_directory_locations(id),
          segment_name TEXT NOT NULL,
          appended_path TEXT NOT NULL,
          promoted_location_id INTEGER REFERENCES directory_locations(id),
          discarded INTEGER NOT NULL DEFAULT 0,
          CHECK((parent_location_id IS NULL) <> (parent_provisional_id IS NULL)),
          CHECK(discarded = 0 OR promoted_location_id IS NULL)
        );
"#;
