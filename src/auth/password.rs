use crate::error::{AppError, AppResult};

/// Hash a password into its stored verifier. One-way; the plaintext is
/// never persisted.
pub fn hash(password: &str) -> AppResult<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a plaintext password against a stored verifier - constant-time
/// via bcrypt. A malformed verifier verifies as false, not as an error.
pub fn verify(password: &str, verifier: &str) -> bool {
    bcrypt::verify(password, verifier).unwrap_or(false)
}
