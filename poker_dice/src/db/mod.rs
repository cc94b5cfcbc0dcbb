//! Storage boundary.
//!
//! Repository traits the managers depend on, in-memory implementations, and
//! timeout helpers for repository calls.

use std::sync::Arc;

pub mod errors;
pub mod memory;
pub mod repository;
pub mod timeouts;

pub use errors::{RepositoryError, RepositoryResult};
pub use memory::{
    InMemoryAccountRepository, InMemoryGameRepository, InMemoryLobbyRepository,
    InMemorySessionRepository,
};
pub use repository::{AccountRepository, GameRepository, LobbyRepository, SessionRepository};
pub use timeouts::with_timeout;

/// Repository handles shared by every manager
#[derive(Clone)]
pub struct Repositories {
    pub accounts: Arc<dyn AccountRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub lobbies: Arc<dyn LobbyRepository>,
    pub games: Arc<dyn GameRepository>,
}

impl Repositories {
    /// Fresh in-memory storage
    pub fn in_memory() -> Self {
        Self {
            accounts: Arc::new(InMemoryAccountRepository::new()),
            sessions: Arc::new(InMemorySessionRepository::new()),
            lobbies: Arc::new(InMemoryLobbyRepository::new()),
            games: Arc::new(InMemoryGameRepository::new()),
        }
    }
}
