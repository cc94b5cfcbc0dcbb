//! Account and session data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lobby::LobbyId;

/// Account ID type
pub type AccountId = i64;

/// Registered player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    /// Argon2id hash, never serialized
    #[serde(skip)]
    pub password_hash: String,
    pub display_name: String,
    pub age: u8,
    pub credit: i64,
    pub win_counter: u32,
    /// Lobby the account currently sits in
    pub current_lobby: Option<LobbyId>,
    pub created_at: DateTime<Utc>,
}

/// Account as handed to storage before an ID is assigned
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub age: u8,
    pub credit: i64,
    pub created_at: DateTime<Utc>,
}

/// Account registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub display_name: String,
    pub age: u8,
    pub password: String,
}

/// Stored session.
///
/// Only the digest of the bearer value is kept, so a leaked session store
/// cannot be replayed as tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    /// Hex SHA-256 digest of the token value
    pub digest: String,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// Token returned to a client after authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Bearer value (base64url, unpadded)
    pub token: String,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
    /// Moment the token expires regardless of use
    pub expires_at: DateTime<Utc>,
}
