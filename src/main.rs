//! ResolveNOW - dispute resolution case service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resolvenow::{
    auth::JwtValidator,
    config::Args,
    db::MongoClient,
    notify,
    server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("resolvenow={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  ResolveNOW - dispute resolution");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Upload dir: {}", args.upload_dir);
    info!("======================================");

    let jwt = if args.dev_mode && args.jwt_secret.is_none() {
        warn!("Using the built-in dev JWT secret - do not expose this instance");
        JwtValidator::new_dev()
    } else {
        match JwtValidator::new(args.jwt_secret(), args.jwt_expiry_seconds) {
            Ok(jwt) => jwt,
            Err(e) => {
                error!("JWT setup failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Connect to MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Some(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!(
                    "MongoDB connection failed (dev mode, continuing without): {}",
                    e
                );
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Email notifications (log-only unless SMTP_HOST is configured)
    let notifier = notify::notifier_from_env();

    // Create application state
    let state = match mongo {
        Some(mongo) => {
            match server::AppState::with_services(args.clone(), jwt, mongo, notifier).await {
                Ok(state) => state,
                Err(e) => {
                    error!("Service initialization failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        None => server::AppState::new(args.clone(), jwt),
    };

    let state = Arc::new(state);

    // Run the server
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
