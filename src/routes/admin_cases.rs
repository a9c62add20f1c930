//! Admin-facing case endpoints
//!
//! All of these operate on the admin's department queue; authorization is
//! enforced inside the case service, so a non-admin token gets NotFound
//! rather than a distinguishable denial.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;

use crate::cases::{CaseResponse, CaseStatus, StatusChangeRequest};
use crate::server::AppState;
use crate::types::AppError;

use super::{authenticate, error_response, json_response, read_json_body};

/// GET /api/admin/cases[?status=...]
pub async fn handle_admin_queue(
    req: &Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let status_filter = match parse_status_filter(req.uri().query()) {
        Ok(filter) => filter,
        Err(e) => return error_response(&e),
    };

    let result: Result<_, AppError> = async {
        let principal = authenticate(req.headers(), &state)?;
        let cases = state
            .case_service()?
            .list_department_cases(&principal, status_filter)
            .await?;
        let body: Vec<CaseResponse> = cases.iter().map(CaseResponse::from_doc).collect();
        Ok(json_response(StatusCode::OK, &body))
    }
    .await;
    result.unwrap_or_else(|e| error_response(&e))
}

/// GET /api/admin/cases/stats
pub async fn handle_admin_stats(
    headers: &HeaderMap,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let result: Result<_, AppError> = async {
        let principal = authenticate(headers, &state)?;
        let stats = state.case_service()?.department_stats(&principal).await?;
        Ok(json_response(StatusCode::OK, &stats))
    }
    .await;
    result.unwrap_or_else(|e| error_response(&e))
}

/// PATCH /api/admin/cases/{id}/status
pub async fn handle_status_change(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<Full<Bytes>> {
    let result: Result<_, AppError> = async {
        let principal = authenticate(req.headers(), &state)?;
        let request: StatusChangeRequest = read_json_body(req).await?;
        let case = state
            .case_service()?
            .update_status(&principal, id, request)
            .await?;
        Ok(json_response(StatusCode::OK, &CaseResponse::from_doc(&case)))
    }
    .await;
    result.unwrap_or_else(|e| error_response(&e))
}

/// Parse the optional `status` query parameter; statuses arrive in wire
/// form, with the space percent- or plus-encoded.
fn parse_status_filter(query: Option<&str>) -> Result<Option<CaseStatus>, AppError> {
    let Some(query) = query else {
        return Ok(None);
    };
    let Some(raw) = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("status="))
    else {
        return Ok(None);
    };
    let decoded = raw.replace("%20", " ").replace('+', " ");
    CaseStatus::parse(&decoded)
        .map(Some)
        .ok_or_else(|| AppError::Validation(format!("Unknown status: {}", decoded)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_filter() {
        assert_eq!(parse_status_filter(None).unwrap(), None);
        assert_eq!(parse_status_filter(Some("page=2")).unwrap(), None);
        assert_eq!(
            parse_status_filter(Some("status=Pending")).unwrap(),
            Some(CaseStatus::Pending)
        );
        assert_eq!(
            parse_status_filter(Some("status=In%20Review")).unwrap(),
            Some(CaseStatus::InReview)
        );
        assert_eq!(
            parse_status_filter(Some("page=2&status=In+Mediation")).unwrap(),
            Some(CaseStatus::InMediation)
        );
        assert!(parse_status_filter(Some("status=Escalated")).is_err());
    }
}
