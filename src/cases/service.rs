//! Case service: persistence, workflow enforcement, audit trail, and the
//! side effects that follow every mutation
//!
//! Every successful mutation does three things in order: write the case,
//! append an audit trail entry, then hand the event to the broadcast router
//! and (where the owner should hear about it by email) the notifier. Only
//! the case write can fail a request; audit, broadcast, and email failures
//! are logged and swallowed.
//!
//! Concurrency: status mutations go through a conditional update keyed on
//! the expected pre-state. When a concurrent admin wins the race the update
//! matches nothing and the loser gets [`AppError::Conflict`]; stale
//! transitions are never applied.

use std::sync::Arc;

use bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use serde::Deserialize;
use tracing::{error, warn};

use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{
    CaseDoc, CaseFileDoc, CaseUpdateDoc, CaseUpdateKind, UserDoc, CASE_COLLECTION,
    CASE_FILE_COLLECTION, CASE_UPDATE_COLLECTION, USER_COLLECTION,
};
use crate::notify::{send_detached, CaseNotification, CaseNotifier};
use crate::realtime::BroadcastRouter;
use crate::types::AppError;

use super::workflow::{allowed_transition, CaseStatus, CaseType, Urgency};
use super::{can_access, DashboardStats, Principal};

const MAX_TITLE_CHARS: usize = 200;

/// Submission payload for a new case
#[derive(Debug, Deserialize)]
pub struct NewCase {
    pub title: String,
    pub case_type: CaseType,
    pub description: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub preferred_resolution: Option<String>,
    #[serde(default)]
    pub urgency: Urgency,
}

/// Fields an owner may change while the case is still pending
#[derive(Debug, Default, Deserialize)]
pub struct OwnerCaseEdit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub preferred_resolution: Option<String>,
    #[serde(default)]
    pub urgency: Option<Urgency>,
}

impl OwnerCaseEdit {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.amount.is_none()
            && self.preferred_resolution.is_none()
            && self.urgency.is_none()
    }
}

/// Admin request to move a case through the workflow
#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub new_status: CaseStatus,
    #[serde(default)]
    pub resolution_notes: Option<String>,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

/// Case domain operations, shared by the HTTP handlers
#[derive(Clone)]
pub struct CaseService {
    cases: MongoCollection<CaseDoc>,
    updates: MongoCollection<CaseUpdateDoc>,
    files: MongoCollection<CaseFileDoc>,
    users: MongoCollection<UserDoc>,
    broadcast: BroadcastRouter,
    notifier: Arc<dyn CaseNotifier>,
}

impl CaseService {
    pub async fn new(
        mongo: &MongoClient,
        broadcast: BroadcastRouter,
        notifier: Arc<dyn CaseNotifier>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            cases: mongo.collection(CASE_COLLECTION).await?,
            updates: mongo.collection(CASE_UPDATE_COLLECTION).await?,
            files: mongo.collection(CASE_FILE_COLLECTION).await?,
            users: mongo.collection(USER_COLLECTION).await?,
            broadcast,
            notifier,
        })
    }

    /// Submit a new case. The case starts Pending with its department
    /// derived from the case type; department admins see it on their
    /// dashboards immediately.
    pub async fn submit_case(
        &self,
        principal: &Principal,
        input: NewCase,
    ) -> Result<CaseDoc, AppError> {
        let title = input.title.trim().to_string();
        let description = input.description.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("Title must not be empty".into()));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(AppError::Validation(format!(
                "Title must be at most {} characters",
                MAX_TITLE_CHARS
            )));
        }
        if description.is_empty() {
            return Err(AppError::Validation("Description must not be empty".into()));
        }
        if let Some(amount) = input.amount {
            if !amount.is_finite() || amount < 0.0 {
                return Err(AppError::Validation(
                    "Amount must be a non-negative number".into(),
                ));
            }
        }

        let mut case = CaseDoc::new(
            principal.id,
            title,
            input.case_type,
            description,
            input.amount,
            input.preferred_resolution.filter(|s| !s.trim().is_empty()),
            input.urgency,
        );
        let id = self.cases.insert_one(case.clone()).await?;
        case._id = Some(id);
        case.metadata.created_at = Some(DateTime::now());
        case.metadata.updated_at = Some(DateTime::now());

        self.append_audit(CaseUpdateDoc::event(
            id,
            principal.id,
            CaseUpdateKind::Note,
            "Case submitted".into(),
        ))
        .await;

        self.broadcast.case_created(&case);
        send_detached(
            self.notifier.clone(),
            CaseNotification::case_submitted(&principal.email, &case),
        );

        Ok(case)
    }

    /// Fetch one case the principal is allowed to see. Unknown ids,
    /// malformed ids, and cases outside the principal's reach all report
    /// NotFound.
    pub async fn get_case(&self, principal: &Principal, id_hex: &str) -> Result<CaseDoc, AppError> {
        let id = parse_case_id(id_hex)?;
        let case = self
            .cases
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| AppError::NotFound("Case not found".into()))?;

        if !can_access(principal, &case) {
            return Err(AppError::NotFound("Case not found".into()));
        }
        Ok(case)
    }

    /// All of the principal's own cases, newest first
    pub async fn list_own_cases(&self, principal: &Principal) -> Result<Vec<CaseDoc>, AppError> {
        let mut cases = self
            .cases
            .find_many(doc! { "owner_id": principal.id })
            .await?;
        sort_newest_first(&mut cases);
        Ok(cases)
    }

    /// The admin's department queue, optionally narrowed to one status,
    /// newest first
    pub async fn list_department_cases(
        &self,
        principal: &Principal,
        status: Option<CaseStatus>,
    ) -> Result<Vec<CaseDoc>, AppError> {
        let department = self.require_department(principal)?;

        let mut filter = doc! { "assigned_department": department };
        if let Some(status) = status {
            filter.insert("status", status.as_str());
        }

        let mut cases = self.cases.find_many(filter).await?;
        sort_newest_first(&mut cases);
        Ok(cases)
    }

    /// Owner edit, allowed only while the case is still Pending. Loses to
    /// a concurrent status change with Conflict.
    pub async fn update_case(
        &self,
        principal: &Principal,
        id_hex: &str,
        edit: OwnerCaseEdit,
    ) -> Result<CaseDoc, AppError> {
        let case = self.get_case(principal, id_hex).await?;
        if principal.is_admin() {
            return Err(AppError::Validation(
                "Admins change cases through the status endpoint".into(),
            ));
        }
        if case.status != CaseStatus::Pending {
            return Err(AppError::Validation(
                "Only pending cases can be edited".into(),
            ));
        }
        if edit.is_empty() {
            return Err(AppError::Validation("Nothing to update".into()));
        }

        let mut set = doc! { "metadata.updated_at": DateTime::now() };
        if let Some(title) = &edit.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(AppError::Validation("Title must not be empty".into()));
            }
            if title.chars().count() > MAX_TITLE_CHARS {
                return Err(AppError::Validation(format!(
                    "Title must be at most {} characters",
                    MAX_TITLE_CHARS
                )));
            }
            set.insert("title", title);
        }
        if let Some(description) = &edit.description {
            let description = description.trim();
            if description.is_empty() {
                return Err(AppError::Validation("Description must not be empty".into()));
            }
            set.insert("description", description);
        }
        if let Some(amount) = edit.amount {
            if !amount.is_finite() || amount < 0.0 {
                return Err(AppError::Validation(
                    "Amount must be a non-negative number".into(),
                ));
            }
            set.insert("amount", amount);
        }
        if let Some(preferred) = &edit.preferred_resolution {
            set.insert("preferred_resolution", preferred.trim());
        }
        if let Some(urgency) = edit.urgency {
            set.insert("urgency", bson::to_bson(&urgency).unwrap_or(Bson::Null));
        }

        let case_id = case._id.ok_or_else(|| AppError::Database("Case missing id".into()))?;
        let updated = self
            .cases
            .find_one_and_update(
                doc! {
                    "_id": case_id,
                    "owner_id": principal.id,
                    "status": CaseStatus::Pending.as_str(),
                },
                doc! { "$set": set },
            )
            .await?
            .ok_or_else(|| {
                AppError::Conflict("Case is no longer pending; edit rejected".into())
            })?;

        self.append_audit(CaseUpdateDoc::event(
            case_id,
            principal.id,
            CaseUpdateKind::Edit,
            "Case details updated by owner".into(),
        ))
        .await;

        self.broadcast
            .case_updated(&updated, Some(&principal.id.to_hex()));
        Ok(updated)
    }

    /// Owner cancellation: Pending straight to Closed. Any other pre-state
    /// means an admin got there first, reported as Conflict.
    pub async fn cancel_case(
        &self,
        principal: &Principal,
        id_hex: &str,
    ) -> Result<CaseDoc, AppError> {
        let case = self.get_case(principal, id_hex).await?;
        if principal.is_admin() {
            return Err(AppError::Validation(
                "Admins close cases through the status endpoint".into(),
            ));
        }
        if case.status != CaseStatus::Pending {
            return Err(AppError::Validation(
                "Only pending cases can be cancelled".into(),
            ));
        }

        let case_id = case._id.ok_or_else(|| AppError::Database("Case missing id".into()))?;
        let updated = self
            .cases
            .find_one_and_update(
                doc! {
                    "_id": case_id,
                    "owner_id": principal.id,
                    "status": CaseStatus::Pending.as_str(),
                },
                doc! { "$set": {
                    "status": CaseStatus::Closed.as_str(),
                    "metadata.updated_at": DateTime::now(),
                }},
            )
            .await?
            .ok_or_else(|| {
                AppError::Conflict("Case is no longer pending; cancellation rejected".into())
            })?;

        self.append_audit(CaseUpdateDoc::status_change(
            case_id,
            principal.id,
            CaseStatus::Pending,
            CaseStatus::Closed,
        ))
        .await;

        self.broadcast
            .case_status_changed(&updated, CaseStatus::Pending);
        self.push_owner_stats(updated.owner_id).await;
        Ok(updated)
    }

    /// Admin status transition.
    ///
    /// Validates the edge against the fixed workflow, then applies it with
    /// a conditional update keyed on the status the admin saw. A concurrent
    /// transition that already moved the case makes this fail with Conflict
    /// rather than silently re-applying a stale decision.
    pub async fn update_status(
        &self,
        principal: &Principal,
        id_hex: &str,
        request: StatusChangeRequest,
    ) -> Result<CaseDoc, AppError> {
        if !principal.is_admin() {
            return Err(AppError::NotFound("Case not found".into()));
        }
        let case = self.get_case(principal, id_hex).await?;
        let expected = case.status;
        let new_status = request.new_status;

        if !allowed_transition(expected, new_status) {
            return Err(AppError::Validation(format!(
                "Transition from {} to {} is not allowed",
                expected, new_status
            )));
        }

        let resolution_notes = request
            .resolution_notes
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if new_status == CaseStatus::Resolved && resolution_notes.is_none() {
            return Err(AppError::Validation(
                "Resolution notes are required to resolve a case".into(),
            ));
        }

        let set = status_change_set(new_status, resolution_notes, request.admin_notes.as_deref());

        let case_id = case._id.ok_or_else(|| AppError::Database("Case missing id".into()))?;
        let updated = self
            .cases
            .find_one_and_update(
                doc! { "_id": case_id, "status": expected.as_str() },
                doc! { "$set": set },
            )
            .await?
            .ok_or_else(|| {
                AppError::Conflict(format!(
                    "Case is no longer {}; transition rejected",
                    expected
                ))
            })?;

        self.append_audit(CaseUpdateDoc::status_change(
            case_id,
            principal.id,
            expected,
            new_status,
        ))
        .await;

        self.broadcast.case_status_changed(&updated, expected);
        self.push_owner_stats(updated.owner_id).await;
        self.notify_owner_status_change(&updated, expected).await;

        Ok(updated)
    }

    /// Per-status counts for the principal's own cases
    pub async fn dashboard_stats(&self, principal: &Principal) -> Result<DashboardStats, AppError> {
        let cases = self
            .cases
            .find_many(doc! { "owner_id": principal.id })
            .await?;
        Ok(DashboardStats::from_cases(&cases))
    }

    /// Per-status counts for the admin's department queue
    pub async fn department_stats(
        &self,
        principal: &Principal,
    ) -> Result<DashboardStats, AppError> {
        let department = self.require_department(principal)?;
        let cases = self
            .cases
            .find_many(doc! { "assigned_department": department })
            .await?;
        Ok(DashboardStats::from_cases(&cases))
    }

    /// Audit trail for a case, oldest entry first
    pub async fn list_updates(
        &self,
        principal: &Principal,
        id_hex: &str,
    ) -> Result<Vec<CaseUpdateDoc>, AppError> {
        let case = self.get_case(principal, id_hex).await?;
        let case_id = case._id.ok_or_else(|| AppError::Database("Case missing id".into()))?;

        let mut updates = self.updates.find_many(doc! { "case_id": case_id }).await?;
        updates.sort_by_key(|u| u.metadata.created_at);
        Ok(updates)
    }

    /// Record an evidence file already written to disk by the upload
    /// handler.
    pub async fn record_file(
        &self,
        principal: &Principal,
        id_hex: &str,
        file: CaseFileDoc,
    ) -> Result<CaseFileDoc, AppError> {
        let case = self.get_case(principal, id_hex).await?;
        let case_id = case._id.ok_or_else(|| AppError::Database("Case missing id".into()))?;

        let mut file = file;
        file.case_id = case_id;
        file.uploaded_by = principal.id;
        let file_id = self.files.insert_one(file.clone()).await?;
        file._id = Some(file_id);

        self.append_audit(CaseUpdateDoc::event(
            case_id,
            principal.id,
            CaseUpdateKind::FileUpload,
            format!("Evidence uploaded: {}", file.file_name),
        ))
        .await;

        self.broadcast
            .case_updated(&case, Some(&principal.id.to_hex()));
        Ok(file)
    }

    /// Evidence file metadata for a case
    pub async fn list_files(
        &self,
        principal: &Principal,
        id_hex: &str,
    ) -> Result<Vec<CaseFileDoc>, AppError> {
        let case = self.get_case(principal, id_hex).await?;
        let case_id = case._id.ok_or_else(|| AppError::Database("Case missing id".into()))?;

        let mut files = self.files.find_many(doc! { "case_id": case_id }).await?;
        files.sort_by_key(|f| f.uploaded_at);
        Ok(files)
    }

    fn require_department<'a>(&self, principal: &'a Principal) -> Result<&'a str, AppError> {
        if !principal.is_admin() {
            return Err(AppError::NotFound("Not found".into()));
        }
        principal
            .department
            .as_deref()
            .ok_or_else(|| AppError::Validation("Admin account has no department".into()))
    }

    /// Audit writes never fail the request they describe.
    async fn append_audit(&self, entry: CaseUpdateDoc) {
        if let Err(e) = self.updates.insert_one(entry).await {
            error!("Failed to append audit trail entry: {}", e);
        }
    }

    /// Refresh the owner's dashboard counts after a status transition.
    /// Best-effort like the other side effects.
    async fn push_owner_stats(&self, owner_id: ObjectId) {
        match self.cases.find_many(doc! { "owner_id": owner_id }).await {
            Ok(cases) => {
                self.broadcast
                    .stats_changed(DashboardStats::from_cases(&cases), Some(&owner_id.to_hex()));
            }
            Err(e) => error!("Stats refresh after status change failed: {}", e),
        }
    }

    async fn notify_owner_status_change(&self, case: &CaseDoc, old_status: CaseStatus) {
        match self.users.find_one(doc! { "_id": case.owner_id }).await {
            Ok(Some(owner)) => {
                send_detached(
                    self.notifier.clone(),
                    CaseNotification::status_changed(&owner.email, case, old_status),
                );
            }
            Ok(None) => warn!(owner_id = %case.owner_id, "Case owner not found for notification"),
            Err(e) => error!("Owner lookup for notification failed: {}", e),
        }
    }
}

/// Malformed ids are indistinguishable from unknown ones.
fn parse_case_id(id_hex: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(id_hex).map_err(|_| AppError::NotFound("Case not found".into()))
}

/// Fields written by a status transition.
///
/// `resolution_notes` and `resolved_at` are stored exactly when the case is
/// being resolved; notes supplied on any other transition are dropped so a
/// non-resolved case never carries them.
fn status_change_set(
    new_status: CaseStatus,
    resolution_notes: Option<&str>,
    admin_notes: Option<&str>,
) -> Document {
    let mut set = doc! {
        "status": new_status.as_str(),
        "metadata.updated_at": DateTime::now(),
    };
    if new_status == CaseStatus::Resolved {
        if let Some(notes) = resolution_notes {
            set.insert("resolution_notes", notes);
        }
        set.insert("resolved_at", DateTime::now());
    }
    if let Some(notes) = admin_notes.map(str::trim).filter(|s| !s.is_empty()) {
        set.insert("admin_notes", notes);
    }
    set
}

fn sort_newest_first(cases: &mut [CaseDoc]) {
    cases.sort_by(|a, b| b.metadata.created_at.cmp(&a.metadata.created_at));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_id_rejects_garbage() {
        assert!(matches!(
            parse_case_id("not-a-hex-id"),
            Err(AppError::NotFound(_))
        ));
        assert!(parse_case_id(&ObjectId::new().to_hex()).is_ok());
    }

    #[test]
    fn test_owner_edit_is_empty() {
        assert!(OwnerCaseEdit::default().is_empty());
        assert!(!OwnerCaseEdit {
            title: Some("new title".into()),
            ..Default::default()
        }
        .is_empty());
    }

    #[test]
    fn test_status_change_request_parses_wire_statuses() {
        let req: StatusChangeRequest =
            serde_json::from_str(r#"{"new_status":"In Review","admin_notes":"triaged"}"#).unwrap();
        assert_eq!(req.new_status, CaseStatus::InReview);
        assert_eq!(req.admin_notes.as_deref(), Some("triaged"));
        assert!(req.resolution_notes.is_none());

        assert!(serde_json::from_str::<StatusChangeRequest>(r#"{"new_status":"Escalated"}"#)
            .is_err());
    }

    #[test]
    fn test_resolution_notes_dropped_unless_resolving() {
        // Notes sent alongside a non-resolving transition must not land in
        // the document; only a Resolved case carries resolution fields.
        let set = status_change_set(CaseStatus::InReview, Some("premature notes"), None);
        assert_eq!(set.get_str("status").unwrap(), "In Review");
        assert!(!set.contains_key("resolution_notes"));
        assert!(!set.contains_key("resolved_at"));

        let set = status_change_set(CaseStatus::Closed, Some("premature notes"), None);
        assert!(!set.contains_key("resolution_notes"));
        assert!(!set.contains_key("resolved_at"));
    }

    #[test]
    fn test_resolving_stores_notes_and_timestamp() {
        let set = status_change_set(CaseStatus::Resolved, Some("refund issued"), Some("  "));
        assert_eq!(set.get_str("status").unwrap(), "Resolved");
        assert_eq!(set.get_str("resolution_notes").unwrap(), "refund issued");
        assert!(set.contains_key("resolved_at"));
        // Blank admin notes are not written
        assert!(!set.contains_key("admin_notes"));
    }

    #[test]
    fn test_sort_newest_first() {
        let owner = ObjectId::new();
        let mk = |ms: i64| {
            let mut c = CaseDoc::new(
                owner,
                "t".into(),
                CaseType::Other,
                "d".into(),
                None,
                None,
                Urgency::Low,
            );
            c.metadata.created_at = Some(DateTime::from_millis(ms));
            c
        };
        let mut cases = vec![mk(1_000), mk(3_000), mk(2_000)];
        sort_newest_first(&mut cases);
        let times: Vec<_> = cases
            .iter()
            .map(|c| c.metadata.created_at.unwrap().timestamp_millis())
            .collect();
        assert_eq!(times, vec![3_000, 2_000, 1_000]);
    }
}
