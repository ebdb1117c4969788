#![forbid(unsafe_code)]

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BranchType {
    Trunk,
    Feature,
    Release,
    TagBased,
    ReadOnly,
}

impl BranchType {
    pub fn code(self) -> i64 {
        match self {
            Self::Trunk => 1,
            Self::Feature => 2,
            Self::Release => 3,
            Self::TagBased => 4,
            Self::ReadOnly => 5,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Trunk),
            2 => Some(Self::Feature),
            3 => Some(Self::Release),
            4 => Some(Self::TagBased),
            5 => Some(Self::ReadOnly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trunk => "trunk",
            Self::Feature => "feature",
            Self::Release => "release",
            Self::TagBased => "tag_based",
            Self::ReadOnly => "read_only",
        }
    }

    /// Tag-based and read-only branches are snapshots; nothing may be written to them.
    pub fn accepts_writes(self) -> bool {
        !matches!(self, Self::TagBased | Self::ReadOnly)
    }

    /// Release and tag-based branches only see ancestor history up to the point they were cut.
    pub fn freezes_ancestor_history(self) -> bool {
        matches!(self, Self::Release | Self::TagBased)
    }
}

/// Why a branch-scoped copy of a name or location row exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CreatedForReason {
    Delete,
    Move,
    Rename,
    MoveAndRename,
}

impl CreatedForReason {
    pub fn code(self) -> i64 {
        match self {
            Self::Delete => 1,
            Self::Move => 2,
            Self::Rename => 3,
            Self::MoveAndRename => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Delete),
            2 => Some(Self::Move),
            3 => Some(Self::Rename),
            4 => Some(Self::MoveAndRename),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Move => "move",
            Self::Rename => "rename",
            Self::MoveAndRename => "move_and_rename",
        }
    }
}
