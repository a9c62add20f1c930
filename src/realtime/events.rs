//! Wire messages for the dashboard WebSocket feed
//!
//! ## Protocol
//!
//! Connect: `ws://host/ws`, then authenticate with a bearer token before the
//! handshake deadline.
//!
//! Messages (client → server):
//! - `auth` - Authenticate with a JWT (`{"type":"auth","token":"..."}`)
//! - `subscribe` - Subscribe to a channel (acknowledged, no filtering yet)
//! - `ping` - Keep-alive ping
//!
//! Messages (server → client):
//! - `auth_success` - Handshake accepted
//! - `case_update` - A case the client can see was edited
//! - `new_case` - A case was submitted (admin dashboards only)
//! - `case_status_change` - Status moved; carries old and new status so the
//!   client can render the transition without a re-fetch
//! - `stats_update` - Dashboard counts changed
//! - `dashboard_refresh` - No payload; the client should re-fetch
//! - `pong` / `error`
//!
//! Both directions are closed tagged unions: adding a message kind is a
//! compile-time-checked change at every dispatch site.

use serde::{Deserialize, Serialize};

use crate::cases::{CaseResponse, CaseStatus, DashboardStats};

/// Message sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Handshake accepted
    AuthSuccess {
        principal_id: String,
        #[serde(rename = "isAdmin")]
        is_admin: bool,
    },
    /// A visible case was edited
    CaseUpdate {
        case: CaseResponse,
        timestamp: String,
    },
    /// A case was submitted (delivered to admin dashboards; the owner
    /// already has the synchronous HTTP response)
    NewCase {
        case: CaseResponse,
        timestamp: String,
    },
    /// A case moved through the workflow
    CaseStatusChange {
        case: CaseResponse,
        old_status: CaseStatus,
        new_status: CaseStatus,
        timestamp: String,
    },
    /// Dashboard counts changed
    StatsUpdate {
        stats: DashboardStats,
        timestamp: String,
    },
    /// Payload-free signal to re-fetch
    DashboardRefresh { timestamp: String },
    /// Keep-alive reply
    Pong { timestamp: String },
    /// Protocol or handshake failure; usually followed by a close
    Error { error: String },
}

/// Message received from client
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate with a JWT
    Auth { token: String },
    /// Subscribe to a named channel
    Subscribe {
        #[serde(default)]
        channel: String,
    },
    /// Keep-alive ping
    Ping,
}

/// RFC 3339 timestamp for event payloads
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_success_wire_format() {
        let msg = ServerEvent::AuthSuccess {
            principal_id: "64f000000000000000000001".into(),
            is_admin: true,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"auth_success\""));
        assert!(json.contains("\"isAdmin\":true"));
        assert!(json.contains("\"principal_id\""));
    }

    #[test]
    fn test_status_change_carries_both_statuses() {
        let case = CaseResponse {
            id: "c1".into(),
            owner_id: "u1".into(),
            title: "t".into(),
            case_type: crate::cases::CaseType::Consumer,
            description: "d".into(),
            amount: None,
            preferred_resolution: None,
            urgency: crate::cases::Urgency::Medium,
            status: CaseStatus::InReview,
            assigned_department: "Consumer Affairs".into(),
            resolution_notes: None,
            admin_notes: None,
            resolved_at: None,
            created_at: None,
            updated_at: None,
        };
        let msg = ServerEvent::CaseStatusChange {
            case,
            old_status: CaseStatus::Pending,
            new_status: CaseStatus::InReview,
            timestamp: now_iso(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"case_status_change\""));
        assert!(json.contains("\"old_status\":\"Pending\""));
        assert!(json.contains("\"new_status\":\"In Review\""));
    }

    #[test]
    fn test_client_message_parsing() {
        let auth: ClientMessage =
            serde_json::from_str(r#"{"type":"auth","token":"abc"}"#).unwrap();
        assert!(matches!(auth, ClientMessage::Auth { token } if token == "abc"));

        let ping: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, ClientMessage::Ping));

        let sub: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","channel":"cases"}"#).unwrap();
        assert!(matches!(sub, ClientMessage::Subscribe { channel } if channel == "cases"));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"shutdown"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
    }
}
