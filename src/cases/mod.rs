//! Case domain: workflow rules, authorization, and the case service
//!
//! The authorization policy lives here as an explicit predicate rather than
//! being delegated to a database policy engine: a case is visible to its
//! owner and to admins whose department matches the case's assigned
//! department, and to nobody else. Callers that fail the predicate are told
//! the case does not exist.

pub mod service;
pub mod workflow;

pub use service::{CaseService, NewCase, OwnerCaseEdit, StatusChangeRequest};
pub use workflow::{allowed_transition, CaseStatus, CaseType, Urgency};

use bson::oid::ObjectId;
use serde::Serialize;

use crate::auth::Claims;
use crate::db::schemas::{CaseDoc, CaseUpdateDoc, UserRole};
use crate::types::AppError;

/// Authenticated identity acting on cases
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: ObjectId,
    pub email: String,
    pub role: UserRole,
    pub department: Option<String>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Build a principal from verified token claims
    pub fn from_claims(claims: &Claims) -> Result<Self, AppError> {
        let id = ObjectId::parse_str(&claims.sub)
            .map_err(|_| AppError::AuthenticationRequired("Malformed principal id".into()))?;
        Ok(Self {
            id,
            email: claims.email.clone(),
            role: claims.role,
            department: claims.department.clone(),
        })
    }
}

/// Whether `principal` may read or mutate `case`.
///
/// Ownership always grants access, whatever the owner's role; admins are
/// additionally granted access to cases assigned to their own department.
/// Everyone else is denied, and denials surface as NotFound.
pub fn can_access(principal: &Principal, case: &CaseDoc) -> bool {
    if case.owner_id == principal.id {
        return true;
    }
    principal.role == UserRole::Admin
        && principal.department.as_deref() == Some(case.assigned_department.as_str())
}

/// Case representation returned over the wire (string ids, RFC 3339 times)
#[derive(Debug, Clone, Serialize)]
pub struct CaseResponse {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub case_type: CaseType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_resolution: Option<String>,
    pub urgency: Urgency,
    pub status: CaseStatus,
    pub assigned_department: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl CaseResponse {
    pub fn from_doc(case: &CaseDoc) -> Self {
        Self {
            id: case._id.map(|id| id.to_hex()).unwrap_or_default(),
            owner_id: case.owner_id.to_hex(),
            title: case.title.clone(),
            case_type: case.case_type,
            description: case.description.clone(),
            amount: case.amount,
            preferred_resolution: case.preferred_resolution.clone(),
            urgency: case.urgency,
            status: case.status,
            assigned_department: case.assigned_department.clone(),
            resolution_notes: case.resolution_notes.clone(),
            admin_notes: case.admin_notes.clone(),
            resolved_at: case.resolved_at.map(to_rfc3339),
            created_at: case.metadata.created_at.map(to_rfc3339),
            updated_at: case.metadata.updated_at.map(to_rfc3339),
        }
    }
}

/// Audit trail entry returned over the wire
#[derive(Debug, Clone, Serialize)]
pub struct CaseUpdateResponse {
    pub id: String,
    pub case_id: String,
    pub author_id: String,
    pub kind: crate::db::schemas::CaseUpdateKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_status: Option<CaseStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<CaseStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl CaseUpdateResponse {
    pub fn from_doc(update: &CaseUpdateDoc) -> Self {
        Self {
            id: update._id.map(|id| id.to_hex()).unwrap_or_default(),
            case_id: update.case_id.to_hex(),
            author_id: update.author_id.to_hex(),
            kind: update.kind,
            message: update.message.clone(),
            old_status: update.old_status,
            new_status: update.new_status,
            created_at: update.metadata.created_at.map(to_rfc3339),
        }
    }
}

/// Counts by status, used by the owner dashboard and the admin queue header
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub pending: usize,
    pub in_review: usize,
    pub in_mediation: usize,
    pub resolved: usize,
    pub closed: usize,
}

impl DashboardStats {
    /// Tally a list of cases into per-status counts
    pub fn from_cases(cases: &[CaseDoc]) -> Self {
        let mut stats = DashboardStats {
            total: cases.len(),
            ..Default::default()
        };
        for case in cases {
            match case.status {
                CaseStatus::Pending => stats.pending += 1,
                CaseStatus::InReview => stats.in_review += 1,
                CaseStatus::InMediation => stats.in_mediation += 1,
                CaseStatus::Resolved => stats.resolved += 1,
                CaseStatus::Closed => stats.closed += 1,
            }
        }
        stats
    }
}

fn to_rfc3339(dt: bson::DateTime) -> String {
    dt.to_chrono().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Principal {
        Principal {
            id: ObjectId::new(),
            email: "owner@example.org".into(),
            role: UserRole::Individual,
            department: None,
        }
    }

    fn case_for(owner: &Principal, case_type: CaseType) -> CaseDoc {
        CaseDoc::new(
            owner.id,
            "title".into(),
            case_type,
            "description".into(),
            None,
            None,
            Urgency::Medium,
        )
    }

    #[test]
    fn test_owner_can_access_own_case() {
        let p = owner();
        let case = case_for(&p, CaseType::Consumer);
        assert!(can_access(&p, &case));
    }

    #[test]
    fn test_stranger_cannot_access() {
        let p = owner();
        let case = case_for(&p, CaseType::Consumer);

        let stranger = Principal {
            id: ObjectId::new(),
            email: "stranger@example.org".into(),
            role: UserRole::Lawyer,
            department: None,
        };
        assert!(!can_access(&stranger, &case));
    }

    #[test]
    fn test_admin_scoped_by_department() {
        let p = owner();
        let case = case_for(&p, CaseType::Consumer);

        let mut admin = Principal {
            id: ObjectId::new(),
            email: "admin@example.org".into(),
            role: UserRole::Admin,
            department: Some("Consumer Affairs".into()),
        };
        assert!(can_access(&admin, &case));

        admin.department = Some("Employment".into());
        assert!(!can_access(&admin, &case));

        admin.department = None;
        assert!(!can_access(&admin, &case));
    }

    #[test]
    fn test_admin_owner_keeps_access_outside_department() {
        // An admin who owns a case routed to another department is still
        // the owner; ownership grants access independently of role.
        let admin = Principal {
            id: ObjectId::new(),
            email: "admin@example.org".into(),
            role: UserRole::Admin,
            department: Some("Employment".into()),
        };
        let case = case_for(&admin, CaseType::Consumer);
        assert!(can_access(&admin, &case));
    }

    #[test]
    fn test_stats_tally() {
        let p = owner();
        let mut cases = vec![
            case_for(&p, CaseType::Consumer),
            case_for(&p, CaseType::Contract),
            case_for(&p, CaseType::Other),
        ];
        cases[1].status = CaseStatus::InReview;
        cases[2].status = CaseStatus::Resolved;

        let stats = DashboardStats::from_cases(&cases);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.in_review, 1);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.closed, 0);
    }
}
