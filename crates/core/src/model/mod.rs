#![forbid(unsafe_code)]

mod ids;
mod kinds;
mod records;

pub use ids::*;
pub use kinds::*;
pub use records::*;
