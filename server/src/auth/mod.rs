//! Authentication: identity tokens, the per-request principal, and password
//! digests.
//!
//! # Pre-conditions
//! - The token authority is built from a non-empty secret.
//!
//! # Post-conditions
//! - A request either carries exactly one verified `Principal` or is
//!   answered with 401 before reaching a handler.
//!
//! # Invariants
//! - Tokens are never stored and never logged.
//! - Verification failures are terminal for the request.

pub mod bearer;
pub mod jwt;
pub mod password;
pub mod principal;

pub use jwt::{ISSUER, IssuedToken, TOKEN_TTL_SECS, TokenAuthority, TokenConfigError};
pub use password::{PasswordError, PasswordHasher};
pub use principal::Principal;

/// Why a request's credentials were refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header.
    MissingCredential,
    /// The header is not `Bearer <token>`.
    MalformedCredential,
    /// Bad signature, foreign issuer, unparsable token, or past expiry.
    InvalidOrExpired,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCredential => write!(f, "Authorization header required"),
            Self::MalformedCredential => {
                write!(f, "Invalid authorization format. Use: Bearer <token>")
            }
            Self::InvalidOrExpired => write!(f, "Invalid or expired token"),
        }
    }
}

impl std::error::Error for AuthError {}
