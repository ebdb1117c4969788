use super::super::*;
use crate::session::RequestContext;
use rv_core::model::{Branch, BranchId, BranchType, Tag};
use tracing::info;

impl SqliteStore {
    /// Creates a child branch sharing the parent's root directory.
    pub fn create_branch(
        &mut self,
        ctx: &mut RequestContext,
        request: &CreateBranchRequest,
    ) -> Result<Branch, StoreError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidInput("branch name must not be empty"));
        }

        let branch = self.with_work(ctx, "create_branch", |engine, tx, ctx| {
            let parent = branch_find_tx(tx, request.parent_branch_id)?
                .filter(|branch| !branch.deleted)
                .ok_or(StoreError::UnknownBranch)?;
            if branch_find_by_name_tx(tx, parent.project_id, name)?.is_some() {
                return Err(StoreError::BranchAlreadyExists);
            }

            let (branch_type, tag_id) = match &request.kind {
                ChildBranchKind::Feature => (BranchType::Feature, None),
                ChildBranchKind::Release => (BranchType::Release, None),
                ChildBranchKind::ReadOnly => (BranchType::ReadOnly, None),
                ChildBranchKind::TagBased { tag_text } => {
                    let tag = tag_find_by_text_tx(tx, parent.id, tag_text)?
                        .ok_or(StoreError::UnknownTag)?;
                    (BranchType::TagBased, Some(tag.id))
                }
            };

            let commit_id =
                engine.commit_id_tx(tx, ctx, None, &format!("create branch {name}"))?;
            let branch_id = branch_insert_tx(
                tx,
                &NewBranch {
                    project_id: parent.project_id,
                    name,
                    branch_type,
                    parent_branch_id: Some(parent.id),
                    root_directory_id: parent.root_directory_id,
                    tag_id,
                    commit_id,
                },
            )?;
            branch_find_tx(tx, branch_id)?
                .ok_or_else(|| StoreError::Invariant(format!("branch {branch_id} not readable after insert")))
        })?;

        info!(
            branch_id = branch.id.get(),
            parent_branch_id = request.parent_branch_id.get(),
            branch_type = branch.branch_type.as_str(),
            "branch created"
        );
        Ok(branch)
    }

    /// Tags the branch at a new commit, or at the client transaction's commit.
    pub fn create_tag(
        &mut self,
        ctx: &mut RequestContext,
        branch_id: BranchId,
        text: &str,
        description: &str,
    ) -> Result<Tag, StoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::InvalidInput("tag text must not be empty"));
        }

        self.with_work(ctx, "create_tag", |engine, tx, ctx| {
            branch_find_tx(tx, branch_id)?
                .filter(|branch| !branch.deleted)
                .ok_or(StoreError::UnknownBranch)?;
            if tag_find_by_text_tx(tx, branch_id, text)?.is_some() {
                return Err(StoreError::InvalidInput("tag already exists on the branch"));
            }
            let commit_id = engine.commit_id_tx(tx, ctx, None, &format!("tag {text}"))?;
            let tag_id = tag_insert_tx(tx, branch_id, commit_id, text, description)?;
            tag_find_tx(tx, tag_id)?.ok_or(StoreError::UnknownTag)
        })
    }
}
