//! HTTP surface: shared state, routing, envelopes, and middleware.
//!
//! # Pre-conditions
//! - The store has been migrated and the token authority built.
//!
//! # Post-conditions
//! - Every response body is a JSON envelope, including errors, 404s for
//!   unknown routes, and recovered panics. `/health` and relayed submissions
//!   are the exceptions.
//!
//! # Invariants
//! - Routes under the protected group only run with a verified `Principal`
//!   attached, and every store call they make is scoped by its subject id.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod pagination;
pub mod response;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

pub use error::ApiError;
pub use response::{ApiResponse, Paginated};

use crate::auth::{PasswordHasher, TokenAuthority};
use crate::config::GoogleOAuthConfig;
use crate::store::Store;
use crate::upstream::ExecutionService;

/// State shared by all handlers. Cloned per request; every field is a
/// cheap handle.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: Arc<TokenAuthority>,
    pub passwords: PasswordHasher,
    pub upstream: ExecutionService,
    pub google: Arc<GoogleOAuthConfig>,
}

/// Build the full application router.
#[allow(clippy::disallowed_methods)] // Arc::clone for the auth layer's state
pub fn router(state: AppState) -> Router {
    use handlers::{auth, batches, configs, health, jobs, submit};

    let protected = Router::new()
        .route("/auth/profile", get(auth::profile))
        .route("/submit/job", post(submit::job))
        .route("/submit/batch", post(submit::batch))
        .route("/submit/batch/atomic", post(submit::batch_atomic))
        .route("/configs", get(configs::list).post(configs::create))
        .route("/configs/active", get(configs::active))
        .route(
            "/configs/{id}",
            get(configs::get).put(configs::update).delete(configs::delete),
        )
        .route("/configs/{id}/activate", post(configs::activate))
        .route("/configs/{id}/deactivate", post(configs::deactivate))
        .route("/jobs", get(jobs::list))
        .route("/jobs/stats", get(jobs::stats))
        .route("/jobs/{id}", get(jobs::get))
        .route("/batches", get(batches::list))
        .route("/batches/{id}", get(batches::get))
        .route("/batches/{id}/jobs", get(batches::jobs))
        .route_layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state.tokens),
            middleware::authenticate,
        ));

    let routes = Router::new()
        .route("/health", get(health::health))
        .route("/status", get(health::status))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/google", get(auth::google_login))
        .route("/auth/google/callback", get(auth::google_callback))
        .merge(protected)
        .fallback(handlers::not_found);

    with_request_layers(routes).with_state(state)
}

/// Layers every request passes through. Panic recovery is outermost, so a
/// panic in logging or CORS is recovered too.
fn with_request_layers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(axum::middleware::from_fn(middleware::cors))
        .layer(axum::middleware::from_fn(middleware::access_log))
        .layer(axum::middleware::from_fn(middleware::catch_panic))
}
