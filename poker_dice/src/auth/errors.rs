//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Storage error
    #[error("Storage error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing failed
    #[error("Password hashing failed")]
    HashingFailed,

    /// Unknown username or wrong password; deliberately indistinguishable
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Username already exists
    #[error("Username already exists")]
    UsernameTaken,

    /// Username, display name or age out of bounds
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    /// Password rejected by the password policy
    #[error("Unsafe password: {0}")]
    UnsafePassword(String),

    /// Token unknown or malformed
    #[error("Invalid token")]
    TokenInvalid,

    /// Token outlived its absolute or rolling lifetime
    #[error("Token expired")]
    TokenExpired,

    /// Account not found
    #[error("Account not found")]
    AccountNotFound,
}

impl AuthError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            AuthError::Repository(_) | AuthError::HashingFailed => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
