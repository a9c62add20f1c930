//! Owner-facing case endpoints

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;

use crate::cases::{CaseResponse, CaseUpdateResponse, NewCase, OwnerCaseEdit};
use crate::server::AppState;
use crate::types::AppError;

use super::{authenticate, error_response, json_response, read_json_body};

/// POST /api/cases
pub async fn handle_submit_case(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let result: Result<_, AppError> = async {
        let principal = authenticate(req.headers(), &state)?;
        let input: NewCase = read_json_body(req).await?;
        let case = state
            .case_service()?
            .submit_case(&principal, input)
            .await?;
        Ok(json_response(
            StatusCode::CREATED,
            &CaseResponse::from_doc(&case),
        ))
    }
    .await;
    result.unwrap_or_else(|e| error_response(&e))
}

/// GET /api/cases
pub async fn handle_list_cases(headers: &HeaderMap, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let result: Result<_, AppError> = async {
        let principal = authenticate(headers, &state)?;
        let cases = state.case_service()?.list_own_cases(&principal).await?;
        let body: Vec<CaseResponse> = cases.iter().map(CaseResponse::from_doc).collect();
        Ok(json_response(StatusCode::OK, &body))
    }
    .await;
    result.unwrap_or_else(|e| error_response(&e))
}

/// GET /api/cases/stats
pub async fn handle_case_stats(headers: &HeaderMap, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let result: Result<_, AppError> = async {
        let principal = authenticate(headers, &state)?;
        let stats = state.case_service()?.dashboard_stats(&principal).await?;
        Ok(json_response(StatusCode::OK, &stats))
    }
    .await;
    result.unwrap_or_else(|e| error_response(&e))
}

/// GET /api/cases/{id}
pub async fn handle_get_case(
    headers: &HeaderMap,
    state: Arc<AppState>,
    id: &str,
) -> Response<Full<Bytes>> {
    let result: Result<_, AppError> = async {
        let principal = authenticate(headers, &state)?;
        let case = state.case_service()?.get_case(&principal, id).await?;
        Ok(json_response(StatusCode::OK, &CaseResponse::from_doc(&case)))
    }
    .await;
    result.unwrap_or_else(|e| error_response(&e))
}

/// PUT /api/cases/{id}
pub async fn handle_update_case(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<Full<Bytes>> {
    let result: Result<_, AppError> = async {
        let principal = authenticate(req.headers(), &state)?;
        let edit: OwnerCaseEdit = read_json_body(req).await?;
        let case = state
            .case_service()?
            .update_case(&principal, id, edit)
            .await?;
        Ok(json_response(StatusCode::OK, &CaseResponse::from_doc(&case)))
    }
    .await;
    result.unwrap_or_else(|e| error_response(&e))
}

/// DELETE /api/cases/{id} - owner cancellation, Pending only
pub async fn handle_cancel_case(
    headers: &HeaderMap,
    state: Arc<AppState>,
    id: &str,
) -> Response<Full<Bytes>> {
    let result: Result<_, AppError> = async {
        let principal = authenticate(headers, &state)?;
        let case = state.case_service()?.cancel_case(&principal, id).await?;
        Ok(json_response(StatusCode::OK, &CaseResponse::from_doc(&case)))
    }
    .await;
    result.unwrap_or_else(|e| error_response(&e))
}

/// GET /api/cases/{id}/updates - audit trail, oldest first
pub async fn handle_case_updates(
    headers: &HeaderMap,
    state: Arc<AppState>,
    id: &str,
) -> Response<Full<Bytes>> {
    let result: Result<_, AppError> = async {
        let principal = authenticate(headers, &state)?;
        let updates = state.case_service()?.list_updates(&principal, id).await?;
        let body: Vec<CaseUpdateResponse> =
            updates.iter().map(CaseUpdateResponse::from_doc).collect();
        Ok(json_response(StatusCode::OK, &body))
    }
    .await;
    result.unwrap_or_else(|e| error_response(&e))
}
