//! The authenticated caller attached to a request.
//!
//! # Invariants
//! - A principal is attached at most once per request. Later attachments are
//!   refused and the first one wins.
//! - Handlers read the principal through the [`Principal`] extractor. A
//!   request that reaches a handler without one is answered with 401.

use axum::extract::FromRequestParts;
use axum::http::Extensions;
use axum::http::request::Parts;

use super::AuthError;
use crate::api::ApiError;
use crate::store::UserId;

/// Identity carried by a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: UserId,
    pub email: String,
}

impl Principal {
    /// Attach this principal to a request's extensions.
    ///
    /// Returns `false`, leaving the existing principal in place, if one is
    /// already attached.
    pub fn attach(self, extensions: &mut Extensions) -> bool {
        if extensions.get::<Self>().is_some() {
            return false;
        }
        extensions.insert(self);
        true
    }

    /// Read the principal attached to a request, if any.
    #[must_use]
    pub fn from_extensions(extensions: &Extensions) -> Option<&Self> {
        extensions.get::<Self>()
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_extensions(&parts.extensions)
            .cloned()
            .ok_or_else(|| ApiError::from(AuthError::MissingCredential))
    }
}
