//! Lobby error types.

use thiserror::Error;

use crate::{db::RepositoryError, game::GameError, wallet::WalletError};

/// Lobby errors
#[derive(Debug, Error)]
pub enum LobbyError {
    /// Lobby does not exist (or was already deleted)
    #[error("Lobby not found")]
    NotFound,

    /// Lobby reached its max players
    #[error("Lobby is full")]
    Full,

    /// Account is already a member of this lobby
    #[error("Already a member of this lobby")]
    AlreadyMember,

    /// Private lobby password missing or wrong
    #[error("Wrong lobby password")]
    WrongPassword,

    /// Account cannot cover the lobby's minimum credit
    #[error("Insufficient credit: required {required}, available {available}")]
    InsufficientCredit { required: i64, available: i64 },

    /// Account is not a member of this lobby
    #[error("Not a member of this lobby")]
    NotMember,

    /// Only the host may do this
    #[error("Only the host can start the game")]
    NotHost,

    /// Too few members to start
    #[error("Not enough players: {joined} joined, {required} required")]
    NotEnoughPlayers { required: usize, joined: usize },

    /// Game already started
    #[error("Game already running")]
    AlreadyRunning,

    /// Settings outside the configured bounds
    #[error("Invalid lobby settings: {0}")]
    InvalidSettings(String),

    /// Host already hosts a lobby that has not started
    #[error("Host already hosts an open lobby")]
    HostAlreadyHostingOpenLobby,

    /// Account sits in another lobby
    #[error("Already in another lobby")]
    BusyInAnotherLobby,

    /// Lobby password could not be hashed
    #[error("Password hashing failed")]
    HashingFailed,

    /// Lobby actor did not answer in time
    #[error("Lobby request timed out")]
    Timeout,

    /// Rejected game action
    #[error(transparent)]
    Game(#[from] GameError),

    /// Credit operation failed
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// Storage error
    #[error("Storage error: {0}")]
    Repository(#[from] RepositoryError),
}

impl LobbyError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            LobbyError::Repository(_) | LobbyError::HashingFailed => {
                "Internal server error".to_string()
            }
            LobbyError::Wallet(e) => e.client_message(),
            _ => self.to_string(),
        }
    }
}

/// Result type for lobby operations
pub type LobbyResult<T> = Result<T, LobbyError>;
