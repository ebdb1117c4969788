#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE INDEX IF NOT EXISTS idx_directory_locations_child
          ON directory_locations(branch_id, parent_location_id, segment_name);
        CREATE INDEX IF NOT EXISTS idx_directory_locations_directory
          ON directory_locations(directory_id, branch_id);

        CREATE INDEX IF NOT EXISTS idx_file_names_directory
          ON file_names(directory_id, name);
        CREATE INDEX IF NOT EXISTS idx_file_names_file
          ON file_names(file_id, branch_id);

        CREATE INDEX IF NOT EXISTS idx_file_revisions_file
          ON file_revisions(file_id, branch_id, id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_file_revisions_successor
          ON file_revisions(reverse_delta_revision_id)
          WHERE reverse_delta_revision_id IS NOT NULL;

        CREATE INDEX IF NOT EXISTS idx_provisional_user
          ON provisional_directory_locations(user_id, branch_id, appended_path);
"#;
