//! Server configuration module.
//!
//! This module provides configuration loading for the gateway from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `JWT_SECRET`: HS256 signing secret for identity tokens (required)
//! - `SERVER_PORT`: Port to listen on (default: `8080`)
//! - `DATABASE_URL`: Store URL; the scheme selects the backend
//!   (default: `sqlite://./data/gateway.db?mode=rwc`, for development).
//!   Production deployments use a `postgres://` URL: only PostgreSQL keeps
//!   writes from different owners fully independent.
//! - `DATABASE_MAX_CONNECTIONS`: Store pool size (default: `10`)
//! - `JANUS_BASE_URL`: Base URL of the execution service (default: `http://localhost:8081`)
//! - `UPSTREAM_TIMEOUT_SECS`: Timeout for execution service calls (default: `30`)
//! - `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `GOOGLE_REDIRECT_URL`: federated login settings
//!
//! # Invariants
//!
//! - `jwt_secret` is never empty
//! - `listen_port` is always a valid port number
//! - `janus_base_url` never ends with `/`

use std::time::Duration;

/// Server configuration.
///
/// # Post-conditions
///
/// - `listen_port` is always in the valid range (0-65535)
/// - `database_max_connections` is at least 1
#[derive(Clone)]
pub struct ServerConfig {
    /// Port to listen on for HTTP connections.
    pub listen_port: u16,
    /// Store connection URL (`sqlite:` or `postgres:`).
    pub database_url: String,
    /// Maximum number of pooled store connections.
    pub database_max_connections: u32,
    /// Secret used to sign and verify identity tokens.
    pub jwt_secret: Vec<u8>,
    /// Base URL of the execution service, without a trailing slash.
    pub janus_base_url: String,
    /// Timeout applied to every execution service call.
    pub upstream_timeout: Duration,
    /// Federated login settings.
    pub google: GoogleOAuthConfig,
}

/// Federated (Google) login settings.
#[derive(Debug, Clone, Default)]
pub struct GoogleOAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_url: Option<String>,
}

impl GoogleOAuthConfig {
    /// Whether both client credentials are present.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Names of the client credential variables that are unset.
    #[must_use]
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.client_id.is_none() {
            missing.push("GOOGLE_CLIENT_ID");
        }
        if self.client_secret.is_none() {
            missing.push("GOOGLE_CLIENT_SECRET");
        }
        missing
    }
}

// The secret must never end up in logs.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("listen_port", &self.listen_port)
            .field("database_url", &self.database_url)
            .field("database_max_connections", &self.database_max_connections)
            .field("jwt_secret", &"<redacted>")
            .field("janus_base_url", &self.janus_base_url)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("google", &self.google.is_configured())
            .finish()
    }
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable is missing.
    MissingEnvVar(String),
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEnvVar(name) => {
                write!(f, "missing required environment variable: {name}")
            }
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl ServerConfig {
    /// Default port for the server.
    pub const DEFAULT_PORT: u16 = 8080;
    /// Default store URL.
    pub const DEFAULT_DATABASE_URL: &'static str = "sqlite://./data/gateway.db?mode=rwc";
    /// Default store pool size.
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    /// Default execution service URL.
    pub const DEFAULT_JANUS_BASE_URL: &'static str = "http://localhost:8081";
    /// Default execution service timeout in seconds.
    pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `JWT_SECRET` is not set or is empty
    /// - a numeric variable is set but does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let jwt_secret = var("JWT_SECRET")
            .ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET".to_string()))?
            .into_bytes();

        let listen_port = parse_or("SERVER_PORT", var("SERVER_PORT"), Self::DEFAULT_PORT)?;
        let database_max_connections = parse_or(
            "DATABASE_MAX_CONNECTIONS",
            var("DATABASE_MAX_CONNECTIONS"),
            Self::DEFAULT_MAX_CONNECTIONS,
        )?;
        if database_max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                name: "DATABASE_MAX_CONNECTIONS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        let upstream_timeout_secs = parse_or(
            "UPSTREAM_TIMEOUT_SECS",
            var("UPSTREAM_TIMEOUT_SECS"),
            Self::DEFAULT_UPSTREAM_TIMEOUT_SECS,
        )?;

        let janus_base_url = var("JANUS_BASE_URL")
            .unwrap_or_else(|| Self::DEFAULT_JANUS_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            listen_port,
            database_url: var("DATABASE_URL")
                .unwrap_or_else(|| Self::DEFAULT_DATABASE_URL.to_string()),
            database_max_connections,
            jwt_secret,
            janus_base_url,
            upstream_timeout: Duration::from_secs(upstream_timeout_secs),
            google: GoogleOAuthConfig {
                client_id: var("GOOGLE_CLIENT_ID"),
                client_secret: var("GOOGLE_CLIENT_SECRET"),
                redirect_url: var("GOOGLE_REDIRECT_URL"),
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => value.parse::<T>().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("'{value}' is not a valid number"),
        }),
        None => Ok(default),
    }
}
