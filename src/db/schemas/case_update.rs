//! Case update (audit trail) schema
//!
//! One entry per mutation: status changes, owner edits, admin notes. Read
//! back by the case detail page so both parties see the history.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::cases::CaseStatus;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for case updates
pub const CASE_UPDATE_COLLECTION: &str = "case_updates";

/// Kind of update recorded
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseUpdateKind {
    #[default]
    Note,
    StatusChange,
    Edit,
    FileUpload,
}

/// Audit trail entry for a case
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CaseUpdateDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Case this entry belongs to
    pub case_id: ObjectId,

    /// Principal who made the change
    pub author_id: ObjectId,

    /// What happened
    #[serde(default)]
    pub kind: CaseUpdateKind,

    /// Human-readable summary
    pub message: String,

    /// Previous status, for status changes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_status: Option<CaseStatus>,

    /// New status, for status changes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<CaseStatus>,
}

impl CaseUpdateDoc {
    /// Entry for a status change
    pub fn status_change(
        case_id: ObjectId,
        author_id: ObjectId,
        old_status: CaseStatus,
        new_status: CaseStatus,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            case_id,
            author_id,
            kind: CaseUpdateKind::StatusChange,
            message: format!("Status changed from {} to {}", old_status, new_status),
            old_status: Some(old_status),
            new_status: Some(new_status),
        }
    }

    /// Entry for a non-status event (edit, note, upload)
    pub fn event(
        case_id: ObjectId,
        author_id: ObjectId,
        kind: CaseUpdateKind,
        message: String,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            case_id,
            author_id,
            kind,
            message,
            old_status: None,
            new_status: None,
        }
    }
}

impl IntoIndexes for CaseUpdateDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "case_id": 1, "metadata.created_at": -1 },
            Some(
                IndexOptions::builder()
                    .name("case_update_case_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for CaseUpdateDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_change_message() {
        let entry = CaseUpdateDoc::status_change(
            ObjectId::new(),
            ObjectId::new(),
            CaseStatus::Pending,
            CaseStatus::InReview,
        );
        assert_eq!(entry.kind, CaseUpdateKind::StatusChange);
        assert_eq!(entry.message, "Status changed from Pending to In Review");
        assert_eq!(entry.old_status, Some(CaseStatus::Pending));
        assert_eq!(entry.new_status, Some(CaseStatus::InReview));
    }
}
