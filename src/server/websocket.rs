//! Dashboard WebSocket handling
//!
//! Lifecycle of a connection:
//!
//! 1. Upgrade at `GET /ws`.
//! 2. Auth handshake: the client must send `{"type":"auth","token":...}`
//!    within the configured deadline or the socket is closed. Nothing is
//!    registered and nothing is delivered before the handshake succeeds.
//! 3. Registered phase: the connection appears in the registry and its
//!    outbound queue is drained into the socket. Protocol pings go out on
//!    the configured interval; a socket silent for two intervals is
//!    presumed dead and closed.
//! 4. Any exit path unregisters the connection.

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use hyper_tungstenite::{tungstenite::Message as WsMessage, HyperWebsocket, WebSocketStream};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{interval, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::cases::Principal;
use crate::realtime::{ClientMessage, ConnectionHandle, ServerEvent};
use crate::realtime::events::now_iso;
use crate::server::http::AppState;

type WsStream = WebSocketStream<TokioIo<hyper::upgrade::Upgraded>>;
type WsSender = SplitSink<WsStream, WsMessage>;
type WsReceiver = SplitStream<WsStream>;

/// Handle WebSocket upgrade for the dashboard feed
pub async fn handle_dashboard_upgrade(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let (response, websocket) = match hyper_tungstenite::upgrade(req, None) {
        Ok((resp, ws)) => (resp, ws),
        Err(e) => {
            error!("WebSocket upgrade failed: {}", e);
            return Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from("WebSocket upgrade failed")))
                .unwrap();
        }
    };

    tokio::spawn(async move {
        match await_socket(websocket).await {
            Ok(ws) => {
                if let Err(e) = handle_dashboard_connection(state, ws).await {
                    warn!("Dashboard WebSocket error: {}", e);
                }
            }
            Err(e) => {
                error!("WebSocket connection failed: {}", e);
            }
        }
    });

    let (parts, _body) = response.into_parts();
    Response::from_parts(parts, Full::new(Bytes::new()))
}

async fn await_socket(
    websocket: HyperWebsocket,
) -> Result<WsStream, hyper_tungstenite::tungstenite::Error> {
    websocket.await
}

/// Drive one dashboard connection from handshake to close
async fn handle_dashboard_connection(
    state: Arc<AppState>,
    ws: WsStream,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (mut sender, mut receiver) = ws.split();

    // Phase 1: unauthenticated. The socket gets one deadline to produce a
    // valid token; until it does, it is invisible to the broadcast layer.
    let auth_deadline = Duration::from_secs(state.args.ws_auth_timeout_secs);
    let principal = match timeout(auth_deadline, read_auth(&state, &mut receiver)).await {
        Ok(Ok(principal)) => principal,
        Ok(Err(reason)) => {
            send_error_and_close(&mut sender, &reason).await;
            return Ok(());
        }
        Err(_) => {
            send_error_and_close(&mut sender, "Authentication timed out").await;
            return Ok(());
        }
    };

    let (handle, outbound) = ConnectionHandle::new(
        principal.id.to_hex(),
        principal.is_admin(),
        principal.department.clone(),
    );
    let connection_id = handle.id();
    let principal_id = handle.principal_id().to_string();
    state.registry.register(handle);

    info!(
        connection_id = %connection_id,
        principal_id = %principal_id,
        "Dashboard WebSocket client authenticated"
    );

    let ack = ServerEvent::AuthSuccess {
        principal_id: principal_id.clone(),
        is_admin: principal.is_admin(),
    };
    if send_event(&mut sender, &ack).await.is_err() {
        state.registry.unregister(&principal_id, connection_id);
        return Ok(());
    }

    // Phase 2: registered. Every exit from this loop falls through to the
    // unregister below.
    let result = serve_connection(&state, &mut sender, &mut receiver, outbound).await;

    state.registry.unregister(&principal_id, connection_id);
    info!(
        connection_id = %connection_id,
        principal_id = %principal_id,
        "Dashboard WebSocket connection closed"
    );
    result
}

/// Wait for the client's auth message and verify it
async fn read_auth(state: &Arc<AppState>, receiver: &mut WsReceiver) -> Result<Principal, String> {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => {
                let parsed: ClientMessage = serde_json::from_str(&text)
                    .map_err(|_| "Expected an auth message".to_string())?;
                return match parsed {
                    ClientMessage::Auth { token } => {
                        let result = state.jwt.verify_token(&token);
                        let claims = result
                            .claims
                            .ok_or_else(|| "Invalid or expired token".to_string())?;
                        Principal::from_claims(&claims).map_err(|e| e.to_string())
                    }
                    _ => Err("Authentication required before other messages".to_string()),
                };
            }
            Ok(WsMessage::Close(_)) => return Err("Closed before authenticating".to_string()),
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => continue,
            Ok(_) => return Err("Expected a text auth message".to_string()),
            Err(e) => return Err(format!("WebSocket error: {}", e)),
        }
    }
    Err("Closed before authenticating".to_string())
}

/// Main loop for an authenticated connection
async fn serve_connection(
    state: &Arc<AppState>,
    sender: &mut WsSender,
    receiver: &mut WsReceiver,
    mut outbound: UnboundedReceiver<ServerEvent>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ping_interval = Duration::from_secs(state.args.ws_ping_interval_secs);
    let mut ping_ticker = interval(ping_interval);
    ping_ticker.tick().await; // first tick completes immediately
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            // Event queued by the broadcast router
            event = outbound.recv() => {
                match event {
                    Some(event) => {
                        if send_event(sender, &event).await.is_err() {
                            break;
                        }
                    }
                    // Registry dropped the handle; connection superseded
                    None => break,
                }
            }

            // Liveness: ping on the interval, close after two silent ones
            _ = ping_ticker.tick() => {
                if last_activity.elapsed() > ping_interval * 2 {
                    debug!("Dashboard client unresponsive, closing");
                    let _ = sender.send(WsMessage::Close(None)).await;
                    break;
                }
                if sender.send(WsMessage::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }

            // Message from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        last_activity = Instant::now();
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Ping) => {
                                let pong = ServerEvent::Pong { timestamp: now_iso() };
                                if send_event(sender, &pong).await.is_err() {
                                    break;
                                }
                            }
                            Ok(ClientMessage::Subscribe { channel }) => {
                                // Acknowledged; delivery is not channel-filtered
                                debug!("Client subscribed to channel {:?}", channel);
                            }
                            Ok(ClientMessage::Auth { .. }) => {
                                debug!("Ignoring repeated auth on authenticated connection");
                            }
                            // Malformed or unknown messages are protocol
                            // errors; report and close
                            Err(e) => {
                                let err = ServerEvent::Error {
                                    error: format!("Unrecognized message: {}", e),
                                };
                                let _ = send_event(sender, &err).await;
                                let _ = sender.send(WsMessage::Close(None)).await;
                                break;
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        last_activity = Instant::now();
                        let _ = sender.send(WsMessage::Pong(data)).await;
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        last_activity = Instant::now();
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        debug!("Dashboard client disconnected");
                        break;
                    }
                    Some(Ok(_)) => {
                        last_activity = Instant::now();
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    Ok(())
}

async fn send_event(sender: &mut WsSender, event: &ServerEvent) -> Result<(), ()> {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize event: {}", e);
            return Ok(());
        }
    };
    sender.send(WsMessage::Text(json)).await.map_err(|_| ())
}

async fn send_error_and_close(sender: &mut WsSender, reason: &str) {
    warn!("Dashboard WebSocket handshake rejected: {}", reason);
    let err = ServerEvent::Error {
        error: reason.to_string(),
    };
    if let Ok(json) = serde_json::to_string(&err) {
        let _ = sender.send(WsMessage::Text(json)).await;
    }
    let _ = sender.send(WsMessage::Close(None)).await;
}
