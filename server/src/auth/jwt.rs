//! Token authority: issues and verifies signed identity tokens (HS256 JWTs).
//!
//! # Pre-conditions
//! - The signing secret must be non-empty.
//!
//! # Post-conditions
//! - A verified token yields the `Principal` it was issued for.
//! - Verification fails once `now > expires_at`; there is no leeway.
//!
//! # Invariants
//! - Verification is a pure function of the token, the secret and the clock.
//!   It never touches the store or the network.
//! - The authority is immutable after construction and shared by reference.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bearer::bearer_token;
use super::{AuthError, Principal};
use crate::store::UserId;

/// Issuer embedded in, and required of, every token.
pub const ISSUER: &str = "janus-api";

/// Lifetime of an issued token.
pub const TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

/// Claims carried by an identity token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Subject: the user id.
    sub: Uuid,
    email: String,
    iat: u64,
    exp: u64,
    iss: String,
}

/// Error returned when the token authority cannot be constructed.
#[derive(Debug, PartialEq, Eq)]
pub enum TokenConfigError {
    /// The HS256 secret is empty.
    EmptySecret,
}

impl std::fmt::Display for TokenConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySecret => write!(f, "HS256 secret must not be empty"),
        }
    }
}

impl std::error::Error for TokenConfigError {}

/// A freshly signed token and its validity window (Unix seconds).
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub issued_at: u64,
    pub expires_at: u64,
}

/// Issues and verifies identity tokens with one HS256 key.
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenAuthority {
    /// Build an authority around `secret`.
    ///
    /// # Errors
    /// Returns `TokenConfigError::EmptySecret` if the secret is empty.
    pub fn new(secret: Vec<u8>) -> Result<Self, TokenConfigError> {
        if secret.is_empty() {
            return Err(TokenConfigError::EmptySecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&secret),
            decoding_key: DecodingKey::from_secret(&secret),
            validation,
        })
    }

    /// Issue a token valid from now for [`TOKEN_TTL_SECS`].
    pub fn issue(
        &self,
        subject: UserId,
        email: &str,
    ) -> Result<IssuedToken, jsonwebtoken::errors::Error> {
        self.issue_at(subject, email, jsonwebtoken::get_current_timestamp())
    }

    /// Issue a token as if the current time were `issued_at`.
    pub fn issue_at(
        &self,
        subject: UserId,
        email: &str,
        issued_at: u64,
    ) -> Result<IssuedToken, jsonwebtoken::errors::Error> {
        let expires_at = issued_at + TOKEN_TTL_SECS;
        let claims = Claims {
            sub: subject.0,
            email: email.to_string(),
            iat: issued_at,
            exp: expires_at,
            iss: ISSUER.to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(IssuedToken {
            token,
            issued_at,
            expires_at,
        })
    }

    /// Verify a raw token string.
    ///
    /// # Errors
    /// Returns `AuthError::InvalidOrExpired` for a bad signature, a foreign
    /// issuer, a malformed token, or an expired one.
    pub fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!("token rejected: {:?}", e.kind());
            AuthError::InvalidOrExpired
        })?;

        Ok(Principal {
            subject_id: UserId(data.claims.sub),
            email: data.claims.email,
        })
    }

    /// Verify the value of an `Authorization` header.
    ///
    /// # Errors
    /// `MissingCredential` when the header is absent, `MalformedCredential`
    /// when it is not `Bearer <token>`, otherwise as [`Self::verify`].
    pub fn verify_header(&self, header: Option<&str>) -> Result<Principal, AuthError> {
        let token = bearer_token(header)?;
        self.verify(token)
    }
}
