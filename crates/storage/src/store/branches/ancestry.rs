use super::super::*;
use rv_core::model::{Branch, BranchId, CommitId};
use std::collections::HashSet;
use tracing::trace;

/// One step of an ancestry walk, with the newest commit of that branch the
/// walking branch may see (`None` = everything).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::store) struct VisibleBranch {
    pub(in crate::store) branch_id: BranchId,
    pub(in crate::store) cutoff: Option<CommitId>,
}

impl Engine<'_> {
    pub(in crate::store) fn branch_ancestry_tx(
        &self,
        conn: &Connection,
        branch_id: BranchId,
    ) -> Result<Vec<Branch>, StoreError> {
        let limit = self.services.config().max_branch_depth;
        let mut chain: Vec<Branch> = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(branch_id);

        while let Some(id) = next {
            if !seen.insert(id) {
                return Err(StoreError::BranchCycle);
            }
            if chain.len() == limit {
                return Err(StoreError::BranchDepthExceeded);
            }
            let branch = match branch_find_tx(conn, id)? {
                Some(branch) => branch,
                None if chain.is_empty() => return Err(StoreError::UnknownBranch),
                None => {
                    return Err(StoreError::Invariant(format!(
                        "branch {} names missing parent {id}",
                        chain[chain.len() - 1].id
                    )));
                }
            };
            next = branch.parent_branch_id;
            chain.push(branch);
        }

        trace!(branch_id = branch_id.get(), depth = chain.len(), "branch ancestry resolved");
        Ok(chain)
    }

    /// Ancestry with history cut-offs. Past a release or tag-based branch,
    /// ancestors are only visible up to the commit the branch was cut at.
    pub(in crate::store) fn visible_branches_tx(
        &self,
        conn: &Connection,
        branch_id: BranchId,
    ) -> Result<Vec<VisibleBranch>, StoreError> {
        let mut cutoff: Option<CommitId> = None;
        let mut visible = Vec::new();

        for branch in self.branch_ancestry_tx(conn, branch_id)? {
            visible.push(VisibleBranch {
                branch_id: branch.id,
                cutoff,
            });
            if branch.branch_type.freezes_ancestor_history() {
                let cut_at = match branch.tag_id {
                    Some(tag_id) => {
                        tag_find_tx(conn, tag_id)?
                            .ok_or(StoreError::UnknownTag)?
                            .commit_id
                    }
                    None => branch.commit_id,
                };
                cutoff = Some(cutoff.map_or(cut_at, |current| current.min(cut_at)));
            }
        }
        Ok(visible)
    }
}
