//! Registration, login, profile, and the federated-login placeholders.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::json_body;
use crate::api::{ApiError, ApiResponse, AppState};
use crate::auth::{Principal, password};
use crate::store::{NewUser, StoreError, UserId, UserRecord};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Public view of a user. Never includes the password digest.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub user_id: UserId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for UserView {
    fn from(user: UserRecord) -> Self {
        Self {
            user_id: user.user_id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: UserView,
}

fn issue_token(state: &AppState, user: UserRecord, email: &str) -> Result<AuthPayload, ApiError> {
    let issued = state
        .tokens
        .issue(user.user_id, email)
        .map_err(|e| ApiError::internal("Failed to generate token", &e))?;
    Ok(AuthPayload {
        token: issued.token,
        user: user.into(),
    })
}

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let req = json_body(body)?;
    let name = req.name.trim();
    let email = req.email.trim();
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Name, email, and password are required".to_string(),
        ));
    }
    password::validate(&req.password)?;

    let existing = state
        .store
        .find_user_by_email(email)
        .await
        .map_err(|e| ApiError::store(e, "User not found", "Failed to create user"))?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Email already registered"));
    }

    let digest = state.passwords.hash(&req.password).await?;
    let user = state
        .store
        .create_user(&NewUser {
            name: name.to_string(),
            email: Some(email.to_string()),
            password_hash: Some(digest),
            google_id: None,
        })
        .await
        .map_err(|e| match e {
            // Lost a race with a concurrent registration for the same email.
            StoreError::AlreadyExists => ApiError::Conflict("Email already registered"),
            other => ApiError::store(other, "User not found", "Failed to create user"),
        })?;

    tracing::info!("registered user {}", user.user_id);
    let payload = issue_token(&state, user, email)?;
    Ok(ApiResponse::ok("User registered successfully", payload).with_status(StatusCode::CREATED))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<ApiResponse<AuthPayload>, ApiError> {
    const INVALID: &str = "Invalid email or password";

    let req = json_body(body)?;
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let user = state
        .store
        .find_user_by_email(email)
        .await
        .map_err(|e| ApiError::store(e, INVALID, "Failed to look up user"))?
        .ok_or(ApiError::InvalidLogin(INVALID))?;

    let Some(digest) = user.password_hash.as_deref() else {
        return Err(ApiError::InvalidLogin("This account uses Google login"));
    };
    if !state.passwords.verify(&req.password, digest).await? {
        tracing::debug!("password mismatch for user {}", user.user_id);
        return Err(ApiError::InvalidLogin(INVALID));
    }

    Ok(ApiResponse::ok("Login successful", issue_token(&state, user, email)?))
}

pub async fn profile(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<ApiResponse<UserView>, ApiError> {
    let user = state
        .store
        .get_user(principal.subject_id)
        .await
        .map_err(|e| ApiError::store(e, "User not found", "Failed to fetch user"))?;
    Ok(ApiResponse::ok("Profile retrieved", user.into()))
}

pub async fn google_login(State(state): State<AppState>) -> ApiError {
    let missing = state.google.missing_settings();
    if missing.is_empty() {
        ApiError::NotImplemented("Google OAuth login is not available yet".to_string())
    } else {
        ApiError::NotImplemented(format!(
            "Google OAuth not configured. Please set {}",
            missing.join(" and ")
        ))
    }
}

pub async fn google_callback(State(state): State<AppState>) -> ApiError {
    if state.google.is_configured() {
        ApiError::NotImplemented("Google OAuth callback is not available yet".to_string())
    } else {
        ApiError::NotImplemented("Google OAuth not configured".to_string())
    }
}
