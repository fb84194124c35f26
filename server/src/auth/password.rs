//! Password digests.
//!
//! bcrypt is CPU-bound, so hashing and verification run on tokio's blocking
//! pool instead of a request task.

/// Shortest password accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// bcrypt only reads the first 72 bytes of its input.
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug)]
pub enum PasswordError {
    TooShort,
    TooLong,
    /// bcrypt failed, or the blocking task was cancelled.
    Hashing(String),
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooShort => write!(
                f,
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            ),
            Self::TooLong => write!(
                f,
                "Password must be at most {MAX_PASSWORD_BYTES} bytes"
            ),
            Self::Hashing(reason) => write!(f, "password hashing failed: {reason}"),
        }
    }
}

impl std::error::Error for PasswordError {}

/// Check the length limits applied at registration.
///
/// # Errors
/// `TooShort` or `TooLong`.
pub fn validate(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(PasswordError::TooLong);
    }
    Ok(())
}

/// Hashes and checks passwords at a fixed bcrypt cost.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl PasswordHasher {
    /// A hasher with an explicit cost. Tests use the bcrypt minimum.
    #[must_use]
    pub const fn with_cost(cost: u32) -> Self {
        Self { cost }
    }

    /// Produce a salted digest of `password`.
    ///
    /// # Errors
    /// `PasswordError::Hashing` if bcrypt fails.
    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| PasswordError::Hashing(format!("task join error: {e}")))?
            .map_err(|e| PasswordError::Hashing(e.to_string()))
    }

    /// Check `password` against a stored digest.
    ///
    /// A digest bcrypt cannot parse counts as a mismatch.
    ///
    /// # Errors
    /// `PasswordError::Hashing` if the blocking task fails.
    pub async fn verify(&self, password: &str, digest: &str) -> Result<bool, PasswordError> {
        let password = password.to_string();
        let digest = digest.to_string();
        let matched = tokio::task::spawn_blocking(move || bcrypt::verify(password, &digest))
            .await
            .map_err(|e| PasswordError::Hashing(format!("task join error: {e}")))?;

        Ok(matched.unwrap_or_else(|e| {
            tracing::warn!("stored password digest is unreadable: {e}");
            false
        }))
    }
}
