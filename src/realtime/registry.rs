//! Connection registry: who is connected right now
//!
//! Each WebSocket connection gets a [`ConnectionHandle`] holding the sending
//! half of its outbound queue. Handles are registered under the principal's
//! id; a principal with three open tabs has three handles. Admin handles are
//! additionally tracked so department dashboards can be fanned out to
//! without walking every entry.
//!
//! The registry is shared state injected into the HTTP server and the
//! broadcast router; nothing here is a global.

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::events::ServerEvent;

/// Handle to one live WebSocket connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    principal_id: String,
    is_admin: bool,
    department: Option<String>,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    /// Create a handle and the receiving half of its outbound queue.
    /// The WebSocket writer task drains the receiver.
    pub fn new(
        principal_id: String,
        is_admin: bool,
        department: Option<String>,
    ) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                id: Uuid::new_v4(),
                principal_id,
                is_admin,
                department,
                sender,
            },
            receiver,
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn principal_id(&self) -> &str {
        &self.principal_id
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn department(&self) -> Option<&str> {
        self.department.as_deref()
    }

    /// Queue an event for this connection. Fails if the connection's writer
    /// task has already exited; callers treat that as a dead connection.
    pub fn send(&self, event: ServerEvent) -> Result<(), ()> {
        self.sender.send(event).map_err(|_| ())
    }
}

/// Registry of live connections keyed by principal id
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, Vec<ConnectionHandle>>,
    admins: DashMap<Uuid, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection after a successful auth handshake
    pub fn register(&self, handle: ConnectionHandle) {
        if handle.is_admin() {
            self.admins.insert(handle.id(), handle.clone());
        }
        self.connections
            .entry(handle.principal_id().to_string())
            .or_default()
            .push(handle);
    }

    /// Remove a connection. Empty per-principal entries are dropped so the
    /// map does not accumulate keys for principals who have disconnected.
    pub fn unregister(&self, principal_id: &str, connection_id: Uuid) {
        self.admins.remove(&connection_id);

        let now_empty = match self.connections.get_mut(principal_id) {
            Some(mut handles) => {
                handles.retain(|h| h.id() != connection_id);
                handles.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.connections
                .remove_if(principal_id, |_, handles| handles.is_empty());
        }
    }

    /// All live connections for one principal
    pub fn connections_for(&self, principal_id: &str) -> Vec<ConnectionHandle> {
        self.connections
            .get(principal_id)
            .map(|handles| handles.clone())
            .unwrap_or_default()
    }

    /// All live admin connections, optionally narrowed to one department
    pub fn admin_connections(&self, department: Option<&str>) -> Vec<ConnectionHandle> {
        self.admins
            .iter()
            .filter(|entry| match department {
                Some(dept) => entry.value().department() == Some(dept),
                None => true,
            })
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Every live connection
    pub fn all_connections(&self) -> Vec<ConnectionHandle> {
        self.connections
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.connections.iter().map(|e| e.value().len()).sum()
    }

    /// Number of distinct connected principals
    pub fn principal_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_handle(principal: &str) -> (ConnectionHandle, mpsc::UnboundedReceiver<ServerEvent>) {
        ConnectionHandle::new(principal.into(), false, None)
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ConnectionRegistry::new();
        let (h1, _r1) = user_handle("alice");
        let (h2, _r2) = user_handle("alice");
        let (h3, _r3) = user_handle("bob");

        registry.register(h1.clone());
        registry.register(h2);
        registry.register(h3);

        assert_eq!(registry.connection_count(), 3);
        assert_eq!(registry.principal_count(), 2);
        assert_eq!(registry.connections_for("alice").len(), 2);
        assert_eq!(registry.connections_for("bob").len(), 1);
        assert!(registry.connections_for("carol").is_empty());
    }

    #[test]
    fn test_unregister_removes_only_that_connection() {
        let registry = ConnectionRegistry::new();
        let (h1, _r1) = user_handle("alice");
        let (h2, _r2) = user_handle("alice");

        registry.register(h1.clone());
        registry.register(h2.clone());
        registry.unregister("alice", h1.id());

        let remaining = registry.connections_for("alice");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id(), h2.id());
    }

    #[test]
    fn test_unregister_last_connection_drops_entry() {
        let registry = ConnectionRegistry::new();
        let (h1, _r1) = user_handle("alice");

        registry.register(h1.clone());
        registry.unregister("alice", h1.id());

        assert_eq!(registry.principal_count(), 0);
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let registry = ConnectionRegistry::new();
        let (h1, _r1) = user_handle("alice");
        registry.register(h1);

        registry.unregister("nobody", Uuid::new_v4());
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn test_admin_connections_scoped_by_department() {
        let registry = ConnectionRegistry::new();
        let (admin_a, _ra) =
            ConnectionHandle::new("admin-a".into(), true, Some("Consumer Affairs".into()));
        let (admin_b, _rb) = ConnectionHandle::new("admin-b".into(), true, Some("Employment".into()));
        let (user, _ru) = user_handle("alice");

        registry.register(admin_a.clone());
        registry.register(admin_b);
        registry.register(user);

        assert_eq!(registry.admin_connections(None).len(), 2);

        let consumer = registry.admin_connections(Some("Consumer Affairs"));
        assert_eq!(consumer.len(), 1);
        assert_eq!(consumer[0].id(), admin_a.id());

        assert!(registry.admin_connections(Some("Family Services")).is_empty());
    }

    #[test]
    fn test_unregister_admin_clears_admin_set() {
        let registry = ConnectionRegistry::new();
        let (admin, _r) =
            ConnectionHandle::new("admin-a".into(), true, Some("Consumer Affairs".into()));
        registry.register(admin.clone());

        registry.unregister("admin-a", admin.id());
        assert!(registry.admin_connections(None).is_empty());
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_send_fails_after_receiver_dropped() {
        let (handle, receiver) = user_handle("alice");
        drop(receiver);
        assert!(handle
            .send(ServerEvent::Pong {
                timestamp: super::super::events::now_iso(),
            })
            .is_err());
    }
}
