#![forbid(unsafe_code)]

use super::*;
use rv_core::model::{Branch, BranchId, ProjectId};

mod ancestry;
mod create;
mod delete;

pub(in crate::store) use ancestry::VisibleBranch;

impl SqliteStore {
    pub fn find_branch(&self, branch_id: BranchId) -> Result<Option<Branch>, StoreError> {
        branch_find_tx(&self.conn, branch_id)
    }

    pub fn find_branch_by_name(
        &self,
        project_id: ProjectId,
        name: &str,
    ) -> Result<Option<Branch>, StoreError> {
        branch_find_by_name_tx(&self.conn, project_id, name)
    }

    /// The branch followed by its parents, ending at the trunk.
    pub fn branch_ancestry(&self, branch_id: BranchId) -> Result<Vec<Branch>, StoreError> {
        self.engine().branch_ancestry_tx(&self.conn, branch_id)
    }
}
