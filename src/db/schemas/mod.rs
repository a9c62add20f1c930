//! Database schemas for ResolveNOW
//!
//! MongoDB document structures for users, cases, evidence files, and the
//! case audit trail.

mod case;
mod case_file;
mod case_update;
mod metadata;
mod user;

pub use case::{CaseDoc, CASE_COLLECTION};
pub use case_file::{CaseFileDoc, CASE_FILE_COLLECTION};
pub use case_update::{CaseUpdateDoc, CaseUpdateKind, CASE_UPDATE_COLLECTION};
pub use metadata::Metadata;
pub use user::{UserDoc, UserRole, USER_COLLECTION};
