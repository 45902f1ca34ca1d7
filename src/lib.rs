pub mod api;
pub mod auth;
pub mod claims;
pub mod cli;
pub mod config;
pub mod db;
pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod refresh_key;
pub mod session;
pub mod store;

use api::create_api_router;
use auth::{SessionGate, session_gate};
use axum::{Router, middleware};
use config::{AuthConfig, ConfigError};
use db::Database;
use rate_limit::RateLimitConfig;
use session::SessionRepository;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use store::CredentialStore;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Where refresh entries live
    pub store: Arc<dyn CredentialStore>,
    /// Secrets, algorithm, TTLs, admin paths and cookie flags
    pub auth: AuthConfig,
    /// Login/register attempts per client IP per minute
    pub login_per_minute: NonZeroU32,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Result<Router, ConfigError> {
    config.auth.validate()?;

    let sessions = Arc::new(SessionRepository::new(&config.auth, config.store.clone()));
    let gate = Arc::new(SessionGate::new(&config.auth, sessions.clone())?);
    let rate_limit_config = Arc::new(RateLimitConfig::new(config.login_per_minute));

    Ok(
        create_api_router(config.db.clone(), sessions, rate_limit_config)
            .layer(middleware::from_fn_with_state(gate, session_gate)),
    )
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config).map_err(std::io::Error::other)?;
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
