//! Build records: the canonical document, its lifecycle and validation.

pub mod lifecycle;
pub mod schema;
mod types;

pub use lifecycle::{BuildState, build_complete};
pub use schema::ValidationErrors;
pub use types::{BuildLog, BuildRecord, OcpInfo};
