#![forbid(unsafe_code)]

/// Row identities are SQLite integer keys; each table gets its own newtype so
/// a file id can never be passed where a revision id is expected.
macro_rules! row_id {
    ($($name:ident),+ $(,)?) => {
        $(
            #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
            pub struct $name(i64);

            impl $name {
                pub const fn new(value: i64) -> Self {
                    Self(value)
                }

                pub const fn get(self) -> i64 {
                    self.0
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )+
    };
}

row_id!(
    ProjectId,
    BranchId,
    TagId,
    CommitId,
    UserId,
    DirectoryId,
    DirectoryLocationId,
    FileId,
    FileNameId,
    FileRevisionId,
    ProvisionalLocationId,
);

/// Identifies one client connection for transaction bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionKey(u64);

impl ConnectionKey {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}
