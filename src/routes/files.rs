//! Evidence file endpoints
//!
//! Uploads arrive as a raw body with the original name in `X-File-Name`
//! and the type in `Content-Type`. Bytes land on local disk under the
//! configured upload directory; only metadata goes to the store, and the
//! on-disk path never leaves the server.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::schemas::CaseFileDoc;
use crate::server::AppState;
use crate::types::AppError;

use super::{authenticate, error_response, json_response};

/// File metadata returned over the wire; the storage path stays private
#[derive(Debug, Serialize)]
pub struct CaseFileResponse {
    pub id: String,
    pub case_id: String,
    pub file_name: String,
    pub size: u64,
    pub mime_type: String,
    pub uploaded_by: String,
    pub uploaded_at: String,
}

impl CaseFileResponse {
    fn from_doc(file: &CaseFileDoc) -> Self {
        Self {
            id: file._id.map(|id| id.to_hex()).unwrap_or_default(),
            case_id: file.case_id.to_hex(),
            file_name: file.file_name.clone(),
            size: file.size,
            mime_type: file.mime_type.clone(),
            uploaded_by: file.uploaded_by.to_hex(),
            uploaded_at: file.uploaded_at.to_chrono().to_rfc3339(),
        }
    }
}

/// POST /api/cases/{id}/files
pub async fn handle_upload_file(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<Full<Bytes>> {
    let result: Result<_, AppError> = async {
        let principal = authenticate(req.headers(), &state)?;

        let file_name = req
            .headers()
            .get("x-file-name")
            .and_then(|h| h.to_str().ok())
            .map(sanitize_file_name)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::Validation("X-File-Name header is required".into()))?;
        let mime_type = req
            .headers()
            .get("content-type")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        // Reject declared-oversize uploads before reading the body
        if let Some(declared) = req
            .headers()
            .get("content-length")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
        {
            if declared > state.args.max_upload_bytes {
                return Err(AppError::Validation(format!(
                    "File exceeds the {} byte limit",
                    state.args.max_upload_bytes
                )));
            }
        }

        let body = req
            .collect()
            .await
            .map_err(|e| AppError::Http(format!("Failed to read upload body: {}", e)))?
            .to_bytes();
        if body.is_empty() {
            return Err(AppError::Validation("Upload body is empty".into()));
        }
        if body.len() > state.args.max_upload_bytes {
            return Err(AppError::Validation(format!(
                "File exceeds the {} byte limit",
                state.args.max_upload_bytes
            )));
        }

        // Access check happens in record_file before anything is persisted;
        // run it first so unauthorized uploads never touch the disk.
        let service = state.case_service()?;
        let case = service.get_case(&principal, id).await?;
        let case_hex = case._id.map(|c| c.to_hex()).unwrap_or_default();

        let dir = format!("{}/{}", state.args.upload_dir, case_hex);
        tokio::fs::create_dir_all(&dir).await?;
        let storage_path = format!("{}/{}-{}", dir, Uuid::new_v4(), file_name);
        tokio::fs::write(&storage_path, &body).await?;

        let file = CaseFileDoc::new(
            case._id.unwrap_or_default(),
            file_name,
            body.len() as u64,
            mime_type,
            storage_path,
            principal.id,
        );
        let recorded = service.record_file(&principal, id, file).await?;

        Ok(json_response(
            StatusCode::CREATED,
            &CaseFileResponse::from_doc(&recorded),
        ))
    }
    .await;
    result.unwrap_or_else(|e| error_response(&e))
}

/// GET /api/cases/{id}/files
pub async fn handle_list_files(
    headers: &HeaderMap,
    state: Arc<AppState>,
    id: &str,
) -> Response<Full<Bytes>> {
    let result: Result<_, AppError> = async {
        let principal = authenticate(headers, &state)?;
        let files = state.case_service()?.list_files(&principal, id).await?;
        let body: Vec<CaseFileResponse> = files.iter().map(CaseFileResponse::from_doc).collect();
        Ok(json_response(StatusCode::OK, &body))
    }
    .await;
    result.unwrap_or_else(|e| error_response(&e))
}

/// Strip path components and shell-hostile characters from an uploaded
/// file name.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' '))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("receipt.pdf"), "receipt.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\lease.pdf"), "lease.pdf");
        assert_eq!(sanitize_file_name("my photo (1).png"), "my photo 1.png");
        assert_eq!(sanitize_file_name("///"), "");
    }
}
