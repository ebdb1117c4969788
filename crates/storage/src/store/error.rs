#![forbid(unsafe_code)]

use crate::delta::HydrateError;
use rv_core::model::{BranchId, FileRevisionId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("config: {0}")]
    Config(String),
    #[error("RESET_REQUIRED: {0}")]
    SchemaMismatch(&'static str),
    #[error("unknown id")]
    UnknownId,
    #[error("unknown project")]
    UnknownProject,
    #[error("unknown branch")]
    UnknownBranch,
    #[error("unknown tag")]
    UnknownTag,
    #[error("branch already exists")]
    BranchAlreadyExists,
    #[error("branch {branch_id} does not accept writes")]
    BranchReadOnly { branch_id: BranchId },
    #[error("branch ancestry depth exceeded")]
    BranchDepthExceeded,
    #[error("reverse delta chain from revision {revision_id} exceeds {limit} links")]
    DeltaChainTooDeep {
        revision_id: FileRevisionId,
        limit: usize,
    },

    #[error("branch ancestry cycle")]
    BranchCycle,
    #[error("revision {revision_id} already has reverse delta successor {successor_id}")]
    ReverseDeltaAlreadySet {
        revision_id: FileRevisionId,
        successor_id: FileRevisionId,
    },
    #[error("revision {revision_id}: {source}")]
    Hydration {
        revision_id: FileRevisionId,
        source: HydrateError,
    },
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("autocommit is disabled but no client transaction is in progress")]
    TransactionDiscipline,
}

impl StoreError {
    /// Fatal errors mean stored data or transaction state can no longer be
    /// trusted; the operation is aborted and nothing is retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::BranchCycle
                | Self::ReverseDeltaAlreadySet { .. }
                | Self::Hydration { .. }
                | Self::Invariant(_)
                | Self::TransactionDiscipline
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO",
            Self::Sql(_) => "SQL",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Config(_) => "CONFIG",
            Self::SchemaMismatch(_) => "RESET_REQUIRED",
            Self::UnknownId => "UNKNOWN_ID",
            Self::UnknownProject => "UNKNOWN_PROJECT",
            Self::UnknownBranch => "UNKNOWN_BRANCH",
            Self::UnknownTag => "UNKNOWN_TAG",
            Self::BranchAlreadyExists => "BRANCH_ALREADY_EXISTS",
            Self::BranchReadOnly { .. } => "BRANCH_READ_ONLY",
            Self::BranchDepthExceeded => "BRANCH_DEPTH_EXCEEDED",
            Self::DeltaChainTooDeep { .. } => "DELTA_CHAIN_TOO_DEEP",
            Self::BranchCycle => "BRANCH_CYCLE",
            Self::ReverseDeltaAlreadySet { .. } => "REVERSE_DELTA_ALREADY_SET",
            Self::Hydration { .. } => "UNABLE_TO_HYDRATE",
            Self::Invariant(_) => "INVARIANT_VIOLATED",
            Self::TransactionDiscipline => "TRANSACTION_DISCIPLINE",
        }
    }
}
