//! ResolveNOW - dispute resolution case service
//!
//! A REST + WebSocket service for submitting and working dispute cases.
//! Cases move through a fixed workflow (Pending, In Review, In Mediation,
//! Resolved, Closed), scoped to the owner and to department admins, with a
//! real-time dashboard feed over WebSocket.

pub mod auth;
pub mod cases;
pub mod config;
pub mod db;
pub mod notify;
pub mod realtime;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::AppState;
pub use types::{AppError, Result};
