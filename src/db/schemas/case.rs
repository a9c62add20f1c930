//! Case document schema
//!
//! A dispute record moving through the fixed status workflow. The assigned
//! department is derived from the case type at submission and is the key
//! admins are scoped by.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::cases::{CaseStatus, CaseType, Urgency};
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for cases
pub const CASE_COLLECTION: &str = "cases";

/// Case document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CaseDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Owning principal
    pub owner_id: ObjectId,

    /// Short summary of the dispute
    pub title: String,

    /// Dispute category
    pub case_type: CaseType,

    /// Free-form description
    pub description: String,

    /// Disputed amount, if monetary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,

    /// What outcome the submitter is hoping for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_resolution: Option<String>,

    /// Submitter-declared urgency
    #[serde(default)]
    pub urgency: Urgency,

    /// Workflow status
    #[serde(default)]
    pub status: CaseStatus,

    /// Department handling this case, derived from `case_type`
    pub assigned_department: String,

    /// Present exactly when the case was resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,

    /// Internal notes left by the handling admin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,

    /// Present exactly when the case was resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime>,
}

impl CaseDoc {
    /// Create a new pending case; the department is derived here and never
    /// changes afterwards.
    pub fn new(
        owner_id: ObjectId,
        title: String,
        case_type: CaseType,
        description: String,
        amount: Option<f64>,
        preferred_resolution: Option<String>,
        urgency: Urgency,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            owner_id,
            title,
            case_type,
            description,
            amount,
            preferred_resolution,
            urgency,
            status: CaseStatus::Pending,
            assigned_department: case_type.department().to_string(),
            resolution_notes: None,
            admin_notes: None,
            resolved_at: None,
        }
    }
}

impl Default for CaseDoc {
    fn default() -> Self {
        Self {
            _id: None,
            metadata: Metadata::default(),
            owner_id: ObjectId::new(),
            title: String::new(),
            case_type: CaseType::Other,
            description: String::new(),
            amount: None,
            preferred_resolution: None,
            urgency: Urgency::default(),
            status: CaseStatus::default(),
            assigned_department: CaseType::Other.department().to_string(),
            resolution_notes: None,
            admin_notes: None,
            resolved_at: None,
        }
    }
}

impl IntoIndexes for CaseDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "owner_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("owner_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "assigned_department": 1, "status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("department_status_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for CaseDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_case_starts_pending_with_derived_department() {
        let case = CaseDoc::new(
            ObjectId::new(),
            "Refund withheld".into(),
            CaseType::Consumer,
            "Merchant refuses to refund a returned item".into(),
            Some(120.0),
            None,
            Urgency::Medium,
        );

        assert_eq!(case.status, CaseStatus::Pending);
        assert_eq!(case.assigned_department, "Consumer Affairs");
        assert!(case.resolution_notes.is_none());
        assert!(case.resolved_at.is_none());
    }
}
