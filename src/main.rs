//! movies_api server
//!
//! Startup order: configuration -> logging -> catalog store -> router -> serve.
//! A missing or empty JWT secret stops the process before it binds a socket.
//!
//! Usage:
//!   cargo run --bin load_data                      # seed genres and movies
//!   JWT_SECRET=... cargo run --bin movies_api      # start server on :4000

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use movies_api::auth::hash_cost;
use movies_api::config::ServerArgs;
use movies_api::error::ConfigError;
use movies_api::identity::StaticIdentityStore;
use movies_api::logging::init_logging;
use movies_api::poster;
use movies_api::rest::{create_router, AppState};
use movies_api::storage::Storage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    let args = ServerArgs::parse();
    let _log_guard = init_logging(args.log_format)?;

    // Configuration errors are fatal: nothing is served with a bad auth setup.
    let auth = Arc::new(args.auth_config()?);
    let admin = args.admin_identity()?;
    let decoy_cost = hash_cost(&admin.password_hash).map_err(ConfigError::InvalidAdminHash)?;
    tracing::info!(?auth, admin_id = admin.id, "auth configured");

    let storage = Storage::open(&args.data_dir)?;
    let state = AppState::new(
        storage,
        Arc::new(StaticIdentityStore::new(admin)),
        auth,
        poster::from_api_key(args.themoviedb_api_key.clone()),
        decoy_cost,
        args.environment.clone(),
    )?;
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = %args.environment, "starting server");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
