//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one spawned task per connection, and a single
//! routing match. WebSocket upgrades for the dashboard feed are handed to
//! `server::websocket`.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::JwtValidator;
use crate::cases::CaseService;
use crate::config::Args;
use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{UserDoc, USER_COLLECTION};
use crate::notify::CaseNotifier;
use crate::realtime::{BroadcastRouter, ConnectionRegistry};
use crate::routes;
use crate::server::websocket;
use crate::types::AppError;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub jwt: JwtValidator,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcast: BroadcastRouter,
    pub mongo: Option<MongoClient>,
    pub users: Option<MongoCollection<UserDoc>>,
    pub cases: Option<CaseService>,
    pub started_at: Instant,
}

impl AppState {
    /// State without MongoDB (dev mode only); the API surface that needs
    /// the store reports it as unavailable.
    pub fn new(args: Args, jwt: JwtValidator) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcast = BroadcastRouter::new(Arc::clone(&registry));
        Self {
            args,
            jwt,
            registry,
            broadcast,
            mongo: None,
            users: None,
            cases: None,
            started_at: Instant::now(),
        }
    }

    /// Full state with MongoDB-backed services
    pub async fn with_services(
        args: Args,
        jwt: JwtValidator,
        mongo: MongoClient,
        notifier: Arc<dyn CaseNotifier>,
    ) -> Result<Self, AppError> {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcast = BroadcastRouter::new(Arc::clone(&registry));
        let users = mongo.collection(USER_COLLECTION).await?;
        let cases = CaseService::new(&mongo, broadcast.clone(), notifier).await?;
        Ok(Self {
            args,
            jwt,
            registry,
            broadcast,
            mongo: Some(mongo),
            users: Some(users),
            cases: Some(cases),
            started_at: Instant::now(),
        })
    }

    pub fn case_service(&self) -> Result<&CaseService, AppError> {
        self.cases
            .as_ref()
            .ok_or_else(|| AppError::Database("Case store is not available".into()))
    }

    pub fn user_collection(&self) -> Result<&MongoCollection<UserDoc>, AppError> {
        self.users
            .as_ref()
            .ok_or_else(|| AppError::Database("User store is not available".into()))
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), AppError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "ResolveNOW listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - insecure defaults in effect");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .with_upgrades()
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            to_boxed(routes::health_check(Arc::clone(&state)))
        }

        // Readiness probe - 200 only once the store is reachable
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            to_boxed(routes::readiness_check(Arc::clone(&state)))
        }

        // Version info for deployment verification
        (Method::GET, "/version") => to_boxed(routes::version_info()),

        // CORS preflight
        (Method::OPTIONS, _) => to_boxed(preflight_response()),

        // Real-time dashboard feed
        (Method::GET, "/ws") => {
            if hyper_tungstenite::is_upgrade_request(&req) {
                to_boxed(websocket::handle_dashboard_upgrade(state, req).await)
            } else {
                to_boxed(bad_request_response("WebSocket upgrade required for /ws"))
            }
        }

        // Account registration and login
        (Method::POST, "/auth/register") => {
            return Ok(to_boxed(
                routes::handle_register(req, Arc::clone(&state)).await,
            ));
        }
        (Method::POST, "/auth/login") => {
            return Ok(to_boxed(routes::handle_login(req, Arc::clone(&state)).await));
        }
        (Method::GET, "/auth/me") => {
            to_boxed(routes::handle_me(req.headers(), Arc::clone(&state)).await)
        }

        // ====================================================================
        // Case API (owner surface)
        // ====================================================================
        (Method::POST, "/api/cases") | (Method::POST, "/api/cases/submit") => {
            return Ok(to_boxed(
                routes::handle_submit_case(req, Arc::clone(&state)).await,
            ));
        }
        (Method::GET, "/api/cases") => {
            to_boxed(routes::handle_list_cases(req.headers(), Arc::clone(&state)).await)
        }
        (Method::GET, "/api/cases/stats") | (Method::GET, "/api/cases/stats/dashboard") => {
            to_boxed(routes::handle_case_stats(req.headers(), Arc::clone(&state)).await)
        }
        (Method::GET, p) if p.starts_with("/api/cases/") && p.ends_with("/updates") => {
            let id = trim_segment(p, "/api/cases/", "/updates");
            to_boxed(routes::handle_case_updates(req.headers(), Arc::clone(&state), id).await)
        }
        (Method::GET, p) if p.starts_with("/api/cases/") && p.ends_with("/files") => {
            let id = trim_segment(p, "/api/cases/", "/files");
            to_boxed(routes::handle_list_files(req.headers(), Arc::clone(&state), id).await)
        }
        (Method::POST, p) if p.starts_with("/api/cases/") && p.ends_with("/files") => {
            let id = trim_segment(p, "/api/cases/", "/files").to_string();
            return Ok(to_boxed(
                routes::handle_upload_file(req, Arc::clone(&state), &id).await,
            ));
        }
        (Method::GET, p) if p.starts_with("/api/cases/") => {
            let id = p.strip_prefix("/api/cases/").unwrap_or("");
            to_boxed(routes::handle_get_case(req.headers(), Arc::clone(&state), id).await)
        }
        (Method::PUT, p) if p.starts_with("/api/cases/") => {
            let id = p.strip_prefix("/api/cases/").unwrap_or("").to_string();
            return Ok(to_boxed(
                routes::handle_update_case(req, Arc::clone(&state), &id).await,
            ));
        }
        (Method::DELETE, p) if p.starts_with("/api/cases/") => {
            let id = p.strip_prefix("/api/cases/").unwrap_or("");
            to_boxed(routes::handle_cancel_case(req.headers(), Arc::clone(&state), id).await)
        }

        // ====================================================================
        // Admin case API (department queue)
        // ====================================================================
        (Method::GET, "/api/admin/cases") => {
            to_boxed(routes::handle_admin_queue(&req, Arc::clone(&state)).await)
        }
        (Method::GET, "/api/admin/cases/stats") => {
            to_boxed(routes::handle_admin_stats(req.headers(), Arc::clone(&state)).await)
        }
        (Method::PATCH, p) if p.starts_with("/api/admin/cases/") && p.ends_with("/status") => {
            let id = trim_segment(p, "/api/admin/cases/", "/status").to_string();
            return Ok(to_boxed(
                routes::handle_status_change(req, Arc::clone(&state), &id).await,
            ));
        }

        // Not found
        _ => to_boxed(not_found_response(&path)),
    };

    Ok(response)
}

fn trim_segment<'a>(path: &'a str, prefix: &str, suffix: &str) -> &'a str {
    path.strip_prefix(prefix)
        .and_then(|p| p.strip_suffix(suffix))
        .unwrap_or("")
}

/// Convert a Full<Bytes> body to BoxBody
pub fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, PATCH, DELETE, OPTIONS",
        )
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": format!("No route for {}", path),
        "code": "NOT_FOUND",
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Bad request response
fn bad_request_response(message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": message,
        "code": "BAD_REQUEST",
    });

    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
