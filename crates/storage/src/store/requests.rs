#![forbid(unsafe_code)]

use rv_core::model::{
    BranchId, CommitId, DirectoryId, DirectoryLocation, FileId, FileNameId, FileRevisionId,
    ProvisionalParent,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChildBranchKind {
    Feature,
    Release,
    /// Snapshot of the parent at one of its tags.
    TagBased { tag_text: String },
    ReadOnly,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateBranchRequest {
    pub parent_branch_id: BranchId,
    pub name: String,
    pub kind: ChildBranchKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddRevisionRequest {
    pub branch_id: BranchId,
    pub file_id: FileId,
    pub content: Vec<u8>,
    /// Ignored inside a client transaction, which supplies its own commit.
    pub commit_id: Option<CommitId>,
    pub workfile_edit_ms: i64,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddFileRequest {
    pub branch_id: BranchId,
    pub directory_id: DirectoryId,
    pub name: String,
    pub content: Vec<u8>,
    pub commit_id: Option<CommitId>,
    pub workfile_edit_ms: i64,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddedFile {
    pub file_id: FileId,
    pub file_name_id: FileNameId,
    pub revision_id: FileRevisionId,
}

/// Result of a structural file change: the row now carrying the change on the
/// acting branch, and the revision appended to record it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileChange {
    pub file_name_id: FileNameId,
    pub revision_id: FileRevisionId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddProvisionalDirectoryRequest {
    /// Branch the directory is being scaffolded on (the promotion target).
    pub branch_id: BranchId,
    pub parent: ProvisionalParent,
    pub segment_name: String,
    /// Identity of the directory on the promoting branch, when it has one.
    pub directory_id: Option<DirectoryId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PromoteFileCreateRequest {
    /// The file's row on the child branch that created it.
    pub file_name_id: FileNameId,
    pub destination: ProvisionalParent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromotedFile {
    pub file_name_id: FileNameId,
    pub revision_id: FileRevisionId,
    /// Directory locations created or taken over, parent first.
    pub directories: Vec<DirectoryLocation>,
}
