//! Health, readiness, and version endpoints

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;

use crate::server::AppState;

use super::json_response;

/// Liveness probe: 200 whenever the process is serving
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "status": "ok",
        "node_id": state.args.node_id.to_string(),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "connections": state.registry.connection_count(),
    });
    json_response(StatusCode::OK, &body)
}

/// Readiness probe: 200 only once the store is usable. In dev mode without
/// MongoDB the node reports ready but flags the store as disabled.
pub fn readiness_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    if state.mongo.is_some() {
        json_response(
            StatusCode::OK,
            &serde_json::json!({ "status": "ready", "store": "connected" }),
        )
    } else if state.args.dev_mode {
        json_response(
            StatusCode::OK,
            &serde_json::json!({ "status": "ready", "store": "disabled" }),
        )
    } else {
        json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &serde_json::json!({ "status": "not_ready", "store": "unavailable" }),
        )
    }
}

/// Version info for deployment verification
pub fn version_info() -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "commit": env!("GIT_COMMIT_SHORT"),
        "built_at": env!("BUILD_TIMESTAMP"),
    });
    json_response(StatusCode::OK, &body)
}
