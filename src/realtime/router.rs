//! Broadcast router: domain events to connection audiences
//!
//! The case service reports what happened; this router decides who hears
//! about it. Audiences are computed from the registry at send time:
//!
//! - case edited: the owner's connections plus admins of the assigned
//!   department, minus an optional excluded principal (the actor already
//!   has the HTTP response)
//! - case submitted: admins of the assigned department only
//! - status changed: the owner's connections plus admins of the assigned
//!   department
//! - stats changed / dashboard refresh: one principal, or everyone
//!
//! A connection that fails to accept an event is logged and skipped; one
//! dead socket never blocks delivery to the rest of the audience.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::cases::{CaseResponse, CaseStatus, DashboardStats};
use crate::db::schemas::CaseDoc;

use super::events::{now_iso, ServerEvent};
use super::registry::{ConnectionHandle, ConnectionRegistry};

/// Routes domain events to the connections that should see them
#[derive(Clone)]
pub struct BroadcastRouter {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// A case was edited. `exclude` drops the acting principal from the
    /// audience; pass `None` to deliver to everyone who can see the case.
    pub fn case_updated(&self, case: &CaseDoc, exclude: Option<&str>) {
        let event = ServerEvent::CaseUpdate {
            case: CaseResponse::from_doc(case),
            timestamp: now_iso(),
        };
        let audience = self
            .case_audience(case)
            .into_iter()
            .filter(|h| Some(h.principal_id()) != exclude)
            .collect();
        self.deliver(audience, event);
    }

    /// A case was submitted; department admins get a dashboard entry.
    pub fn case_created(&self, case: &CaseDoc) {
        let event = ServerEvent::NewCase {
            case: CaseResponse::from_doc(case),
            timestamp: now_iso(),
        };
        let audience = self
            .registry
            .admin_connections(Some(case.assigned_department.as_str()));
        self.deliver(audience, event);
    }

    /// A case moved through the workflow; owner and department admins hear
    /// about it with both the old and the new status.
    pub fn case_status_changed(&self, case: &CaseDoc, old_status: CaseStatus) {
        let event = ServerEvent::CaseStatusChange {
            case: CaseResponse::from_doc(case),
            old_status,
            new_status: case.status,
            timestamp: now_iso(),
        };
        self.deliver(self.case_audience(case), event);
    }

    /// Dashboard counts changed for one principal, or for everyone.
    pub fn stats_changed(&self, stats: DashboardStats, principal_id: Option<&str>) {
        let event = ServerEvent::StatsUpdate {
            stats,
            timestamp: now_iso(),
        };
        let audience = match principal_id {
            Some(id) => self.registry.connections_for(id),
            None => self.registry.all_connections(),
        };
        self.deliver(audience, event);
    }

    /// Tell one principal (or everyone) to re-fetch their dashboard.
    pub fn dashboard_refresh(&self, principal_id: Option<&str>) {
        let event = ServerEvent::DashboardRefresh {
            timestamp: now_iso(),
        };
        let audience = match principal_id {
            Some(id) => self.registry.connections_for(id),
            None => self.registry.all_connections(),
        };
        self.deliver(audience, event);
    }

    /// Owner connections plus admins of the case's department, deduplicated
    /// by connection id (an admin owning a case in their own department
    /// appears in both sets).
    ///
    /// Admin fan-out is restricted to the assigned department so that the
    /// audience of every case event is exactly the set of principals the
    /// read-access rule lets see that case; admins of other departments
    /// would get 404 fetching it, so they never hear about it either.
    fn case_audience(&self, case: &CaseDoc) -> Vec<ConnectionHandle> {
        let mut audience: HashMap<Uuid, ConnectionHandle> = HashMap::new();
        for handle in self.registry.connections_for(&case.owner_id.to_hex()) {
            audience.insert(handle.id(), handle);
        }
        for handle in self
            .registry
            .admin_connections(Some(case.assigned_department.as_str()))
        {
            audience.insert(handle.id(), handle);
        }
        audience.into_values().collect()
    }

    fn deliver(&self, audience: Vec<ConnectionHandle>, event: ServerEvent) {
        let mut sent = 0usize;
        for handle in &audience {
            match handle.send(event.clone()) {
                Ok(()) => sent += 1,
                Err(()) => {
                    warn!(
                        connection_id = %handle.id(),
                        principal_id = %handle.principal_id(),
                        "Dropping event for dead connection"
                    );
                }
            }
        }
        debug!(sent, audience = audience.len(), "Broadcast delivered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::{CaseType, Urgency};
    use bson::oid::ObjectId;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn setup() -> (Arc<ConnectionRegistry>, BroadcastRouter) {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = BroadcastRouter::new(registry.clone());
        (registry, router)
    }

    fn test_case(owner: ObjectId) -> CaseDoc {
        CaseDoc::new(
            owner,
            "Refund withheld".into(),
            CaseType::Consumer,
            "Merchant refuses to refund".into(),
            Some(120.0),
            None,
            Urgency::Medium,
        )
    }

    fn recv(rx: &mut UnboundedReceiver<ServerEvent>) -> Option<ServerEvent> {
        rx.try_recv().ok()
    }

    #[test]
    fn test_case_created_reaches_department_admins_only() {
        let (registry, router) = setup();
        let owner_id = ObjectId::new();

        let (owner, mut owner_rx) = ConnectionHandle::new(owner_id.to_hex(), false, None);
        let (dept_admin, mut dept_rx) =
            ConnectionHandle::new("admin-1".into(), true, Some("Consumer Affairs".into()));
        let (other_admin, mut other_rx) =
            ConnectionHandle::new("admin-2".into(), true, Some("Employment".into()));
        registry.register(owner);
        registry.register(dept_admin);
        registry.register(other_admin);

        router.case_created(&test_case(owner_id));

        assert!(recv(&mut owner_rx).is_none());
        assert!(matches!(recv(&mut dept_rx), Some(ServerEvent::NewCase { .. })));
        assert!(recv(&mut other_rx).is_none());
    }

    #[test]
    fn test_status_change_reaches_owner_and_department_admins() {
        let (registry, router) = setup();
        let owner_id = ObjectId::new();

        let (owner, mut owner_rx) = ConnectionHandle::new(owner_id.to_hex(), false, None);
        let (dept_admin, mut dept_rx) =
            ConnectionHandle::new("admin-1".into(), true, Some("Consumer Affairs".into()));
        let (stranger, mut stranger_rx) = ConnectionHandle::new("stranger".into(), false, None);
        registry.register(owner);
        registry.register(dept_admin);
        registry.register(stranger);

        let mut case = test_case(owner_id);
        case.status = CaseStatus::InReview;
        router.case_status_changed(&case, CaseStatus::Pending);

        match recv(&mut owner_rx) {
            Some(ServerEvent::CaseStatusChange {
                old_status,
                new_status,
                ..
            }) => {
                assert_eq!(old_status, CaseStatus::Pending);
                assert_eq!(new_status, CaseStatus::InReview);
            }
            other => panic!("expected status change, got {:?}", other.is_some()),
        }
        assert!(matches!(
            recv(&mut dept_rx),
            Some(ServerEvent::CaseStatusChange { .. })
        ));
        assert!(recv(&mut stranger_rx).is_none());
    }

    #[test]
    fn test_case_updated_excludes_actor() {
        let (registry, router) = setup();
        let owner_id = ObjectId::new();

        let (owner, mut owner_rx) = ConnectionHandle::new(owner_id.to_hex(), false, None);
        let (dept_admin, mut dept_rx) =
            ConnectionHandle::new("admin-1".into(), true, Some("Consumer Affairs".into()));
        registry.register(owner);
        registry.register(dept_admin);

        let case = test_case(owner_id);
        router.case_updated(&case, Some(&owner_id.to_hex()));

        assert!(recv(&mut owner_rx).is_none());
        assert!(matches!(
            recv(&mut dept_rx),
            Some(ServerEvent::CaseUpdate { .. })
        ));
    }

    #[test]
    fn test_admin_owner_receives_event_once() {
        let (registry, router) = setup();
        let admin_id = ObjectId::new();

        // Admin owns a case routed to their own department.
        let (handle, mut rx) =
            ConnectionHandle::new(admin_id.to_hex(), true, Some("Consumer Affairs".into()));
        registry.register(handle);

        let mut case = test_case(admin_id);
        case.status = CaseStatus::InReview;
        router.case_status_changed(&case, CaseStatus::Pending);

        assert!(recv(&mut rx).is_some());
        assert!(recv(&mut rx).is_none());
    }

    #[test]
    fn test_dead_connection_does_not_block_others() {
        let (registry, router) = setup();
        let owner_id = ObjectId::new();

        let (dead, dead_rx) = ConnectionHandle::new(owner_id.to_hex(), false, None);
        let (live, mut live_rx) = ConnectionHandle::new(owner_id.to_hex(), false, None);
        registry.register(dead);
        registry.register(live);
        drop(dead_rx);

        router.case_updated(&test_case(owner_id), None);

        assert!(matches!(
            recv(&mut live_rx),
            Some(ServerEvent::CaseUpdate { .. })
        ));
    }

    #[test]
    fn test_stats_targeted_to_one_principal() {
        let (registry, router) = setup();
        let (alice, mut alice_rx) = ConnectionHandle::new("alice".into(), false, None);
        let (bob, mut bob_rx) = ConnectionHandle::new("bob".into(), false, None);
        registry.register(alice);
        registry.register(bob);

        router.stats_changed(DashboardStats::default(), Some("alice"));
        assert!(matches!(
            recv(&mut alice_rx),
            Some(ServerEvent::StatsUpdate { .. })
        ));
        assert!(recv(&mut bob_rx).is_none());

        router.dashboard_refresh(None);
        assert!(matches!(
            recv(&mut alice_rx),
            Some(ServerEvent::DashboardRefresh { .. })
        ));
        assert!(matches!(
            recv(&mut bob_rx),
            Some(ServerEvent::DashboardRefresh { .. })
        ));
    }
}
