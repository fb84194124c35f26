//! Startup wiring: from a loaded `ServerConfig` to a listening server.
//!
//! # Pre-conditions
//! - `config` passed validation in `ServerConfig::from_env`.
//!
//! # Post-conditions
//! - The store is migrated before the first request is accepted.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::api::{self, AppState};
use crate::auth::{PasswordHasher, TokenAuthority, TokenConfigError};
use crate::config::ServerConfig;
use crate::store::{self, StoreError};
use crate::upstream::{ExecutionService, UpstreamError};

/// Error returned when the server cannot start.
#[derive(Debug)]
pub enum StartupError {
    Token(TokenConfigError),
    Store(StoreError),
    Upstream(UpstreamError),
    Bind(std::io::Error),
    Serve(std::io::Error),
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(e) => write!(f, "invalid token settings: {e}"),
            Self::Store(e) => write!(f, "failed to open store: {e}"),
            Self::Upstream(e) => write!(f, "failed to set up execution service client: {e}"),
            Self::Bind(e) => write!(f, "failed to bind: {e}"),
            Self::Serve(e) => write!(f, "server error: {e}"),
        }
    }
}

impl std::error::Error for StartupError {}

/// Open the store, build the token authority and the upstream client.
pub async fn build_state(config: &ServerConfig) -> Result<AppState, StartupError> {
    let tokens = TokenAuthority::new(config.jwt_secret.clone()).map_err(StartupError::Token)?;
    let store = store::connect(&config.database_url, config.database_max_connections)
        .await
        .map_err(StartupError::Store)?;
    let upstream = ExecutionService::new(&config.janus_base_url, config.upstream_timeout)
        .map_err(StartupError::Upstream)?;

    Ok(AppState {
        store,
        tokens: Arc::new(tokens),
        passwords: PasswordHasher::default(),
        upstream,
        google: Arc::new(config.google.clone()),
    })
}

/// Serve until the process is stopped.
pub async fn run(config: ServerConfig) -> Result<(), StartupError> {
    let state = build_state(&config).await?;
    tracing::info!("store ready, execution service at {}", config.janus_base_url);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    let listener = TcpListener::bind(addr).await.map_err(StartupError::Bind)?;
    tracing::info!("listening on {addr}");

    axum::serve(listener, api::router(state))
        .await
        .map_err(StartupError::Serve)
}
