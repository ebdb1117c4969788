use super::super::*;
use crate::session::RequestContext;
use rv_core::model::BranchId;

impl SqliteStore {
    /// Marks a branch deleted. Its rows stay for history.
    pub fn delete_branch(
        &mut self,
        ctx: &mut RequestContext,
        branch_id: BranchId,
    ) -> Result<(), StoreError> {
        self.with_work(ctx, "delete_branch", |_engine, tx, _ctx| {
            let branch = branch_find_tx(tx, branch_id)?
                .filter(|branch| !branch.deleted)
                .ok_or(StoreError::UnknownBranch)?;
            if branch.is_trunk() {
                return Err(StoreError::InvalidInput("the trunk branch cannot be deleted"));
            }
            if branch_live_children_tx(tx, branch_id)? > 0 {
                return Err(StoreError::InvalidInput(
                    "branch has live child branches; delete them first",
                ));
            }
            branch_mark_deleted_tx(tx, branch_id)?;
            Ok(())
        })
    }
}
