//! Wallet error types.

use thiserror::Error;

use crate::{auth::AccountId, db::RepositoryError};

/// Wallet errors
#[derive(Debug, Error)]
pub enum WalletError {
    /// Storage error
    #[error("Storage error: {0}")]
    Repository(#[from] RepositoryError),

    /// Insufficient credit
    #[error("Insufficient credit: available {available}, required {required}")]
    InsufficientCredit { available: i64, required: i64 },

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Duplicate transaction (idempotency key already used)
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),
}

impl WalletError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            WalletError::Repository(_) => "Internal server error".to_string(),
            WalletError::AccountNotFound(_) => "Account not found".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;
