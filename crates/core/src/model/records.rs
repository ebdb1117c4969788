#![forbid(unsafe_code)]

use super::{
    BranchId, BranchType, CommitId, CreatedForReason, DirectoryId, DirectoryLocationId, FileId,
    FileNameId, FileRevisionId, ProjectId, ProvisionalLocationId, TagId, UserId,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub id: CommitId,
    pub user_id: UserId,
    pub message: String,
    pub committed_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub trunk_branch_id: BranchId,
    pub root_directory_id: DirectoryId,
    pub root_location_id: DirectoryLocationId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branch {
    pub id: BranchId,
    pub project_id: ProjectId,
    pub name: String,
    pub branch_type: BranchType,
    /// `None` only for the trunk.
    pub parent_branch_id: Option<BranchId>,
    pub root_directory_id: DirectoryId,
    pub tag_id: Option<TagId>,
    pub commit_id: CommitId,
    pub deleted: bool,
}

impl Branch {
    pub fn is_trunk(&self) -> bool {
        self.parent_branch_id.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub id: TagId,
    pub branch_id: BranchId,
    pub commit_id: CommitId,
    pub text: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryLocation {
    pub id: DirectoryLocationId,
    pub directory_id: DirectoryId,
    pub branch_id: BranchId,
    /// `None` only for a project's root location.
    pub parent_location_id: Option<DirectoryLocationId>,
    pub segment_name: String,
    pub created_for: Option<CreatedForReason>,
    pub commit_id: CommitId,
    pub deleted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileName {
    pub id: FileNameId,
    pub branch_id: BranchId,
    pub directory_id: DirectoryId,
    pub file_id: FileId,
    pub name: String,
    pub created_for: Option<CreatedForReason>,
    pub commit_id: CommitId,
    pub promoted: bool,
    pub promotion_commit_id: Option<CommitId>,
    pub deleted: bool,
}

/// Revision metadata. Content lives in storage and is read through hydration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRevision {
    pub id: FileRevisionId,
    pub branch_id: BranchId,
    pub file_id: FileId,
    pub ancestor_revision_id: Option<FileRevisionId>,
    pub reverse_delta_revision_id: Option<FileRevisionId>,
    pub commit_id: CommitId,
    pub promoted: bool,
    pub workfile_edit_ms: i64,
    pub digest: Vec<u8>,
}

impl FileRevision {
    /// Only the newest revision of a chain (or one whose delta could not be built) has no successor.
    pub fn stores_full_content(&self) -> bool {
        self.reverse_delta_revision_id.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProvisionalParent {
    Location(DirectoryLocationId),
    Provisional(ProvisionalLocationId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionalDirectoryLocation {
    pub id: ProvisionalLocationId,
    /// Set when the directory already has an identity on the promoting branch.
    pub directory_id: Option<DirectoryId>,
    /// Branch the location will be spliced into.
    pub branch_id: BranchId,
    pub user_id: UserId,
    pub parent: ProvisionalParent,
    pub segment_name: String,
    pub appended_path: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvisionalState {
    Uncreated,
    Pending,
    Promoted(DirectoryLocationId),
    /// Abandoned by a workspace reset before it was promoted.
    Discarded,
}
