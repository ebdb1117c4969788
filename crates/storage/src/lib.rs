#![forbid(unsafe_code)]

pub mod delta;
pub mod session;
mod store;

pub use session::{
    ProvisionalTracker, RequestContext, RevisionDigest, ServiceContext, TransactionEnd,
    TransactionManager, TransactionParticipant,
};
pub use store::*;
