#![forbid(unsafe_code)]

use super::*;
use crate::session::RequestContext;
use rv_core::model::{BranchType, Project};
use rv_core::names::validate_segment;
use tracing::info;

impl SqliteStore {
    /// Creates a project with its root directory and trunk branch.
    pub fn create_project(
        &mut self,
        ctx: &mut RequestContext,
        name: &str,
    ) -> Result<Project, StoreError> {
        validate_segment(name).map_err(|err| StoreError::InvalidInput(err.message()))?;

        let project = self.with_work(ctx, "create_project", |engine, tx, ctx| {
            if project_find_by_name_tx(tx, name)?.is_some() {
                return Err(StoreError::InvalidInput("project already exists"));
            }

            let commit_id = engine.commit_id_tx(tx, ctx, None, &format!("create project {name}"))?;
            let project_id = project_insert_tx(tx, name, commit_id)?;
            let root_directory_id = directory_insert_tx(tx, project_id)?;
            let trunk_id = branch_insert_tx(
                tx,
                &NewBranch {
                    project_id,
                    name: TRUNK_BRANCH_NAME,
                    branch_type: BranchType::Trunk,
                    parent_branch_id: None,
                    root_directory_id,
                    tag_id: None,
                    commit_id,
                },
            )?;
            location_insert_tx(
                tx,
                &NewLocation {
                    directory_id: root_directory_id,
                    branch_id: trunk_id,
                    parent_location_id: None,
                    segment_name: "",
                    created_for: None,
                    commit_id,
                    deleted: false,
                },
            )?;

            project_find_by_name_tx(tx, name)?
                .ok_or_else(|| StoreError::Invariant(format!("project {name} not readable after insert")))
        })?;

        info!(
            project_id = project.id.get(),
            trunk_branch_id = project.trunk_branch_id.get(),
            "project created"
        );
        Ok(project)
    }

    pub fn find_project(&self, name: &str) -> Result<Option<Project>, StoreError> {
        project_find_by_name_tx(&self.conn, name)
    }
}
