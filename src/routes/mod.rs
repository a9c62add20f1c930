//! HTTP route handlers
//!
//! Handlers take either the request headers (read-only endpoints) or the
//! whole request (body-consuming endpoints) plus the shared state, and
//! return a `Response<Full<Bytes>>`. Errors funnel through
//! [`error_response`], which maps [`AppError`] onto its status and stable
//! code.

pub mod admin_cases;
pub mod auth_routes;
pub mod cases;
pub mod files;
pub mod health;

pub use admin_cases::{handle_admin_queue, handle_admin_stats, handle_status_change};
pub use auth_routes::{handle_login, handle_me, handle_register};
pub use cases::{
    handle_cancel_case, handle_case_stats, handle_case_updates, handle_get_case,
    handle_list_cases, handle_submit_case, handle_update_case,
};
pub use files::{handle_list_files, handle_upload_file};
pub use health::{health_check, readiness_check, version_info};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::extract_token_from_header;
use crate::cases::Principal;
use crate::server::AppState;
use crate::types::AppError;

/// JSON response with CORS header
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

/// Error body: human-readable message in `error`, stable machine-readable
/// `code` alongside it
pub fn error_payload(err: &AppError) -> serde_json::Value {
    serde_json::json!({
        "error": err.to_string(),
        "code": err.code(),
    })
}

/// Error response carrying the stable error code
pub fn error_response(err: &AppError) -> Response<Full<Bytes>> {
    Response::builder()
        .status(err.status())
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(error_payload(err).to_string())))
        .unwrap()
}

/// Read and parse a JSON request body
pub async fn read_json_body<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T, AppError> {
    let body = req
        .collect()
        .await
        .map_err(|e| AppError::Http(format!("Failed to read request body: {}", e)))?
        .to_bytes();
    serde_json::from_slice(&body).map_err(|e| AppError::Http(format!("Invalid JSON: {}", e)))
}

/// Authenticate a request from its Authorization header
pub fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Principal, AppError> {
    let header = headers.get("authorization").and_then(|h| h.to_str().ok());
    let token = extract_token_from_header(header)
        .ok_or_else(|| AppError::AuthenticationRequired("Missing bearer token".into()))?;

    let result = state.jwt.verify_token(token);
    let claims = result.claims.ok_or_else(|| {
        AppError::AuthenticationRequired(
            result.error.unwrap_or_else(|| "Invalid token".to_string()),
        )
    })?;
    Principal::from_claims(&claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_payload_shape() {
        let err = AppError::Validation("Title must not be empty".into());
        let body = error_payload(&err);
        assert_eq!(body["error"], "validation error: Title must not be empty");
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let err = AppError::NotFound("Case not found".into());
        let body = error_payload(&err);
        assert_eq!(body["error"], "not found: Case not found");
        assert_eq!(body["code"], "NOT_FOUND");
    }
}
