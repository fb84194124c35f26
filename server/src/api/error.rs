//! Request-level errors and their HTTP rendering.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::response::ApiResponse;
use crate::auth::{AuthError, PasswordError};
use crate::store::StoreError;
use crate::upstream::UpstreamError;

/// Public message for faults whose details stay in the logs.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Every way a request can fail. Each variant maps to one status code and
/// an error envelope.
#[derive(Debug)]
pub enum ApiError {
    /// 401 from token verification.
    Unauthorized(AuthError),
    /// 401 from a failed login.
    InvalidLogin(&'static str),
    BadRequest(String),
    /// 404. Foreign ids produce the same message as missing ones.
    NotFound(&'static str),
    Conflict(&'static str),
    NotImplemented(String),
    /// 502: the execution service could not be reached.
    BadGateway(String),
    /// 503: the store could not be reached.
    Unavailable,
    /// 500 with a short public message. The cause is logged where it arises.
    Internal(&'static str),
}

impl ApiError {
    /// Map a store failure. `not_found` is the public message for a missing
    /// or foreign row, `failure` the one for a backend fault.
    pub fn store(err: StoreError, not_found: &'static str, failure: &'static str) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound(not_found),
            StoreError::AlreadyExists => Self::Conflict("Resource already exists"),
            StoreError::Unavailable(reason) => {
                tracing::error!("store unavailable: {reason}");
                Self::Unavailable
            }
            StoreError::Backend(reason) => {
                tracing::error!("{failure}: {reason}");
                Self::Internal(failure)
            }
        }
    }

    /// Log `cause` and answer 500 with `message`.
    pub fn internal(message: &'static str, cause: &dyn std::fmt::Display) -> Self {
        tracing::error!("{message}: {cause}");
        Self::Internal(message)
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) | Self::InvalidLogin(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized(err) => write!(f, "{err}"),
            Self::InvalidLogin(message)
            | Self::NotFound(message)
            | Self::Conflict(message)
            | Self::Internal(message) => write!(f, "{message}"),
            Self::BadRequest(message) | Self::NotImplemented(message) => write!(f, "{message}"),
            Self::BadGateway(reason) => {
                write!(f, "Failed to connect to execution service: {reason}")
            }
            Self::Unavailable => write!(f, "Service temporarily unavailable"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ApiResponse::error(self.to_string()))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Unauthorized(err)
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooShort | PasswordError::TooLong => Self::BadRequest(err.to_string()),
            PasswordError::Hashing(_) => Self::internal("Failed to process password", &err),
        }
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Unavailable(reason) => Self::BadGateway(reason),
            UpstreamError::Body(_) => {
                Self::internal("Failed to read execution service response", &err)
            }
            UpstreamError::Client(_) => Self::internal(INTERNAL_ERROR_MESSAGE, &err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("rejected request body: {rejection}");
        Self::BadRequest("Invalid request body".to_string())
    }
}
