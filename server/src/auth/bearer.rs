//! Parsing of `Authorization: Bearer <token>` header values.

use super::AuthError;

/// Extract the token from an `Authorization` header value.
///
/// The value must be exactly the word `Bearer`, one space, and a non-empty
/// token with no further spaces.
///
/// # Errors
/// `MissingCredential` when `header` is `None` or empty, `MalformedCredential`
/// for anything that is not in the form above.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header
        .filter(|h| !h.is_empty())
        .ok_or(AuthError::MissingCredential)?;
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MalformedCredential),
    }
}
