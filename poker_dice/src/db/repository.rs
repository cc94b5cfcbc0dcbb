//! Repository trait definitions for testability and dependency injection.
//!
//! The core never talks to a storage engine directly; every manager holds
//! `Arc<dyn ...Repository>` handles. [`super::memory`] ships in-memory
//! implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::RepositoryResult;
use crate::{
    auth::{Account, AccountId, NewAccount, SessionToken},
    game::{Game, GameId, NewGame, Round, RoundId},
    lobby::{Lobby, LobbyId, NewLobby},
    wallet::{CreditEntry, CreditOutcome, NewCreditEntry},
};

/// Trait for account repository operations
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Create a new account, `Conflict` if the username is taken
    async fn create_account(&self, account: NewAccount) -> RepositoryResult<Account>;

    /// Find account by ID
    async fn find_by_id(&self, account_id: AccountId) -> RepositoryResult<Option<Account>>;

    /// Find account by username
    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<Account>>;

    /// Atomically check and apply a credit change and record its ledger entry.
    ///
    /// Debits that would make the balance negative are refused; a reused
    /// idempotency key applies nothing.
    async fn apply_credit(&self, entry: NewCreditEntry) -> RepositoryResult<CreditOutcome>;

    /// Ledger entries of an account, oldest first
    async fn entries(&self, account_id: AccountId) -> RepositoryResult<Vec<CreditEntry>>;

    /// Increment the win counter, returning the new value
    async fn increment_wins(&self, account_id: AccountId) -> RepositoryResult<u32>;

    /// Mark the account as sitting in `lobby_id`.
    ///
    /// Returns `false` without changes if it already sits in another lobby.
    async fn claim_lobby(&self, account_id: AccountId, lobby_id: LobbyId)
    -> RepositoryResult<bool>;

    /// Clear the current lobby if it is `lobby_id`
    async fn release_lobby(&self, account_id: AccountId, lobby_id: LobbyId)
    -> RepositoryResult<()>;
}

/// Trait for session repository operations
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Store a session, evicting the least recently used sessions of the
    /// account beyond `max_per_account`. Returns the evicted sessions.
    async fn create_session(
        &self,
        session: SessionToken,
        max_per_account: usize,
    ) -> RepositoryResult<Vec<SessionToken>>;

    /// Find session by token digest
    async fn find_by_digest(&self, digest: &str) -> RepositoryResult<Option<SessionToken>>;

    /// Update the last use of a session
    async fn touch(&self, digest: &str, at: DateTime<Utc>) -> RepositoryResult<SessionToken>;

    /// Delete a session, returning whether it existed
    async fn delete(&self, digest: &str) -> RepositoryResult<bool>;

    /// Number of live sessions of an account
    async fn count_for_account(&self, account_id: AccountId) -> RepositoryResult<usize>;
}

/// Trait for lobby repository operations
#[async_trait]
pub trait LobbyRepository: Send + Sync {
    /// Store a new lobby and assign its ID
    async fn create_lobby(&self, lobby: NewLobby) -> RepositoryResult<Lobby>;

    /// Get lobby by ID
    async fn get_lobby(&self, lobby_id: LobbyId) -> RepositoryResult<Option<Lobby>>;

    /// Replace a stored lobby
    async fn update_lobby(&self, lobby: &Lobby) -> RepositoryResult<()>;

    /// Delete a lobby, returning whether it existed
    async fn delete_lobby(&self, lobby_id: LobbyId) -> RepositoryResult<bool>;

    /// All lobbies in insertion order
    async fn list_lobbies(&self) -> RepositoryResult<Vec<Lobby>>;

    /// Not-yet-running lobby hosted by `host_id`
    async fn find_open_by_host(&self, host_id: AccountId) -> RepositoryResult<Option<Lobby>>;
}

/// Trait for game, round and turn repository operations
#[async_trait]
pub trait GameRepository: Send + Sync {
    /// Store a new game and assign its ID
    async fn create_game(&self, game: NewGame) -> RepositoryResult<Game>;

    /// Get game by ID
    async fn get_game(&self, game_id: GameId) -> RepositoryResult<Option<Game>>;

    /// Replace a stored game
    async fn update_game(&self, game: &Game) -> RepositoryResult<()>;

    /// Reserve the ID of the next round
    async fn allocate_round_id(&self) -> RepositoryResult<RoundId>;

    /// Insert or replace a round together with its turns
    async fn save_round(&self, round: &Round) -> RepositoryResult<()>;

    /// Rounds of a game by round number
    async fn rounds_for_game(&self, game_id: GameId) -> RepositoryResult<Vec<Round>>;
}
