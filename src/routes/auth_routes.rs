//! Account registration, login, and identity endpoints
//!
//! Registration self-service creates non-admin accounts. Admin accounts
//! carry a department and can only be self-registered in dev mode; in
//! production they are provisioned out of band.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{hash_password, validate_password_strength, verify_password, TokenInput};
use crate::db::schemas::{UserDoc, UserRole};
use crate::server::AppState;
use crate::types::AppError;

use super::{authenticate, error_response, json_response, read_json_body};

use bson::doc;

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    full_name: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    department: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    expires_at: u64,
    user: UserInfo,
}

#[derive(Debug, Serialize)]
struct UserInfo {
    id: String,
    email: String,
    full_name: String,
    role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    department: Option<String>,
}

impl UserInfo {
    fn from_doc(user: &UserDoc) -> Self {
        Self {
            id: user._id.map(|id| id.to_hex()).unwrap_or_default(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            department: user.department.clone(),
        }
    }
}

/// POST /auth/register
pub async fn handle_register(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    match register(req, &state).await {
        Ok(response) => response,
        Err(e) => error_response(&e),
    }
}

async fn register(
    req: Request<Incoming>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError> {
    let input: RegisterRequest = read_json_body(req).await?;

    let email = input.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("A valid email is required".into()));
    }
    validate_password_strength(&input.password)?;
    let full_name = input.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(AppError::Validation("Full name is required".into()));
    }

    let role = match input.role.as_deref() {
        None | Some("") => UserRole::Individual,
        Some(s) => UserRole::parse(s)
            .ok_or_else(|| AppError::Validation(format!("Unknown role: {}", s)))?,
    };

    let department = match role {
        UserRole::Admin => {
            if !state.args.dev_mode {
                warn!(email = %email, "Rejected admin self-registration");
                return Err(AppError::Validation(
                    "Admin accounts cannot be self-registered".into(),
                ));
            }
            let dept = input
                .department
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .ok_or_else(|| {
                    AppError::Validation("Admin accounts require a department".into())
                })?;
            Some(dept.to_string())
        }
        _ => None,
    };

    let users = state.user_collection()?;
    if users.find_one(doc! { "email": &email }).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered".into()));
    }

    let password_hash = hash_password(&input.password)?;
    let mut user = UserDoc::new(email, full_name, password_hash, role, department);
    let id = users.insert_one(user.clone()).await?;
    user._id = Some(id);

    info!(user_id = %id, role = %role, "Account registered");

    let (token, expires_at) = issue_token(state, &user)?;
    Ok(json_response(
        StatusCode::CREATED,
        &AuthResponse {
            token,
            expires_at,
            user: UserInfo::from_doc(&user),
        },
    ))
}

/// POST /auth/login
pub async fn handle_login(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    match login(req, &state).await {
        Ok(response) => response,
        Err(e) => error_response(&e),
    }
}

async fn login(
    req: Request<Incoming>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError> {
    let input: LoginRequest = read_json_body(req).await?;
    let email = input.email.trim().to_lowercase();

    // One error for every failure mode so credentials cannot be probed
    let rejected = || AppError::AuthenticationRequired("Invalid email or password".into());

    let users = state.user_collection()?;
    let user = users
        .find_one(doc! { "email": &email })
        .await?
        .ok_or_else(rejected)?;

    if !user.is_active || !verify_password(&input.password, &user.password_hash)? {
        warn!(email = %email, "Failed login attempt");
        return Err(rejected());
    }

    let (token, expires_at) = issue_token(state, &user)?;
    Ok(json_response(
        StatusCode::OK,
        &AuthResponse {
            token,
            expires_at,
            user: UserInfo::from_doc(&user),
        },
    ))
}

/// GET /auth/me
pub async fn handle_me(headers: &HeaderMap, state: Arc<AppState>) -> Response<Full<Bytes>> {
    match me(headers, &state).await {
        Ok(response) => response,
        Err(e) => error_response(&e),
    }
}

async fn me(headers: &HeaderMap, state: &AppState) -> Result<Response<Full<Bytes>>, AppError> {
    let principal = authenticate(headers, state)?;
    let users = state.user_collection()?;
    let user = users
        .find_one(doc! { "_id": principal.id })
        .await?
        .ok_or_else(|| AppError::NotFound("Account not found".into()))?;
    Ok(json_response(StatusCode::OK, &UserInfo::from_doc(&user)))
}

fn issue_token(state: &AppState, user: &UserDoc) -> Result<(String, u64), AppError> {
    state.jwt.issue_token(TokenInput {
        user_id: user._id.map(|id| id.to_hex()).unwrap_or_default(),
        email: user.email.clone(),
        role: user.role,
        department: user.department.clone(),
        token_version: user.token_version,
    })
}
