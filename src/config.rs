//! Configuration for ResolveNOW
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// ResolveNOW - dispute resolution case service
#[derive(Parser, Debug, Clone)]
#[command(name = "resolvenow")]
#[command(about = "Dispute resolution case service with a real-time dashboard feed")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (relaxed auth, optional MongoDB)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "resolvenow")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "86400")]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// WebSocket liveness ping interval in seconds
    #[arg(long, env = "WS_PING_INTERVAL_SECS", default_value = "30")]
    pub ws_ping_interval_secs: u64,

    /// Seconds an upgraded socket may stay unauthenticated before it is closed
    #[arg(long, env = "WS_AUTH_TIMEOUT_SECS", default_value = "10")]
    pub ws_auth_timeout_secs: u64,

    /// Directory for uploaded evidence files
    #[arg(long, env = "UPLOAD_DIR", default_value = "./uploads")]
    pub upload_dir: String,

    /// Maximum accepted upload size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "10485760")]
    pub max_upload_bytes: usize,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> String {
        if self.dev_mode {
            self.jwt_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
        } else {
            self.jwt_secret
                .clone()
                .expect("JWT_SECRET is required in production mode")
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.ws_ping_interval_secs == 0 {
            return Err("WS_PING_INTERVAL_SECS must be greater than zero".to_string());
        }

        if self.max_upload_bytes == 0 {
            return Err("MAX_UPLOAD_BYTES must be greater than zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_mode_jwt_fallback() {
        let args = Args::parse_from(["resolvenow", "--dev-mode"]);
        assert_eq!(args.jwt_secret(), "dev-only-insecure-secret");
    }

    #[test]
    fn test_validate_requires_secret_in_production() {
        let args = Args::parse_from(["resolvenow"]);
        assert!(args.validate().is_err());

        let args = Args::parse_from(["resolvenow", "--jwt-secret", "s3cret"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_ping_interval() {
        let args = Args::parse_from(["resolvenow", "--dev-mode", "--ws-ping-interval-secs", "0"]);
        assert!(args.validate().is_err());
    }
}
