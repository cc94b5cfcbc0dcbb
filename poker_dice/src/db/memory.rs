//! In-memory repository implementations.
//!
//! Each repository guards its state with a single mutex, so every trait
//! operation is atomic. Used when embedding the core without a database and
//! throughout the tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use super::{
    errors::{RepositoryError, RepositoryResult},
    repository::{AccountRepository, GameRepository, LobbyRepository, SessionRepository},
};
use crate::{
    auth::{Account, AccountId, NewAccount, SessionToken},
    game::{Game, GameId, NewGame, Round, RoundId},
    lobby::{Lobby, LobbyId, NewLobby},
    wallet::{CreditEntry, CreditOutcome, NewCreditEntry},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
struct AccountStore {
    accounts: BTreeMap<AccountId, Account>,
    entries: Vec<CreditEntry>,
    /// Keys are unique per account
    idempotency_keys: HashSet<(AccountId, String)>,
    next_id: AccountId,
}

/// In-memory `AccountRepository`
#[derive(Default)]
pub struct InMemoryAccountRepository {
    store: Mutex<AccountStore>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn account_not_found(id: AccountId) -> RepositoryError {
    RepositoryError::NotFound {
        entity: "account",
        id,
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn create_account(&self, account: NewAccount) -> RepositoryResult<Account> {
        let mut store = lock(&self.store);
        if store
            .accounts
            .values()
            .any(|a| a.username.eq_ignore_ascii_case(&account.username))
        {
            return Err(RepositoryError::Conflict(format!(
                "username {} already exists",
                account.username
            )));
        }

        store.next_id += 1;
        let account = Account {
            id: store.next_id,
            username: account.username,
            password_hash: account.password_hash,
            display_name: account.display_name,
            age: account.age,
            credit: account.credit,
            win_counter: 0,
            current_lobby: None,
            created_at: account.created_at,
        };
        store.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_by_id(&self, account_id: AccountId) -> RepositoryResult<Option<Account>> {
        Ok(lock(&self.store).accounts.get(&account_id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<Account>> {
        Ok(lock(&self.store)
            .accounts
            .values()
            .find(|a| a.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn apply_credit(&self, entry: NewCreditEntry) -> RepositoryResult<CreditOutcome> {
        let mut store = lock(&self.store);
        let scoped_key = (entry.account_id, entry.idempotency_key.clone());
        if store.idempotency_keys.contains(&scoped_key) {
            return Ok(CreditOutcome::Duplicate);
        }

        let account = store
            .accounts
            .get_mut(&entry.account_id)
            .ok_or_else(|| account_not_found(entry.account_id))?;
        let Some(balance) = account.credit.checked_add(entry.amount) else {
            return Ok(CreditOutcome::Overflow);
        };
        if balance < 0 {
            return Ok(CreditOutcome::Insufficient {
                available: account.credit,
            });
        }
        account.credit = balance;

        let id = store.entries.len() as i64 + 1;
        store.idempotency_keys.insert(scoped_key);
        store.entries.push(CreditEntry {
            id,
            account_id: entry.account_id,
            game_id: entry.game_id,
            amount: entry.amount,
            balance_after: balance,
            direction: entry.direction(),
            entry_type: entry.entry_type,
            idempotency_key: entry.idempotency_key,
            description: entry.description,
            created_at: entry.created_at,
        });
        Ok(CreditOutcome::Applied { balance })
    }

    async fn entries(&self, account_id: AccountId) -> RepositoryResult<Vec<CreditEntry>> {
        Ok(lock(&self.store)
            .entries
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn increment_wins(&self, account_id: AccountId) -> RepositoryResult<u32> {
        let mut store = lock(&self.store);
        let account = store
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| account_not_found(account_id))?;
        account.win_counter += 1;
        Ok(account.win_counter)
    }

    async fn claim_lobby(
        &self,
        account_id: AccountId,
        lobby_id: LobbyId,
    ) -> RepositoryResult<bool> {
        let mut store = lock(&self.store);
        let account = store
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| account_not_found(account_id))?;
        match account.current_lobby {
            Some(current) if current != lobby_id => Ok(false),
            _ => {
                account.current_lobby = Some(lobby_id);
                Ok(true)
            }
        }
    }

    async fn release_lobby(
        &self,
        account_id: AccountId,
        lobby_id: LobbyId,
    ) -> RepositoryResult<()> {
        let mut store = lock(&self.store);
        if let Some(account) = store.accounts.get_mut(&account_id)
            && account.current_lobby == Some(lobby_id)
        {
            account.current_lobby = None;
        }
        Ok(())
    }
}

/// In-memory `SessionRepository`
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: Mutex<HashMap<String, SessionToken>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create_session(
        &self,
        session: SessionToken,
        max_per_account: usize,
    ) -> RepositoryResult<Vec<SessionToken>> {
        let mut sessions = lock(&self.sessions);
        if sessions.contains_key(&session.digest) {
            return Err(RepositoryError::Conflict("session already exists".to_string()));
        }

        let mut others: Vec<SessionToken> = sessions
            .values()
            .filter(|s| s.account_id == session.account_id)
            .cloned()
            .collect();
        others.sort_by_key(|s| (s.last_used_at, s.created_at));

        let keep = max_per_account.saturating_sub(1);
        let excess = others.len().saturating_sub(keep);
        let evicted: Vec<SessionToken> = others.into_iter().take(excess).collect();
        for old in &evicted {
            sessions.remove(&old.digest);
        }

        sessions.insert(session.digest.clone(), session);
        Ok(evicted)
    }

    async fn find_by_digest(&self, digest: &str) -> RepositoryResult<Option<SessionToken>> {
        Ok(lock(&self.sessions).get(digest).cloned())
    }

    async fn touch(&self, digest: &str, at: DateTime<Utc>) -> RepositoryResult<SessionToken> {
        let mut sessions = lock(&self.sessions);
        let session = sessions
            .get_mut(digest)
            .ok_or(RepositoryError::NotFound {
                entity: "session",
                id: 0,
            })?;
        session.last_used_at = at;
        Ok(session.clone())
    }

    async fn delete(&self, digest: &str) -> RepositoryResult<bool> {
        Ok(lock(&self.sessions).remove(digest).is_some())
    }

    async fn count_for_account(&self, account_id: AccountId) -> RepositoryResult<usize> {
        Ok(lock(&self.sessions)
            .values()
            .filter(|s| s.account_id == account_id)
            .count())
    }
}

#[derive(Default)]
struct LobbyStore {
    lobbies: BTreeMap<LobbyId, Lobby>,
    next_id: LobbyId,
}

/// In-memory `LobbyRepository`. IDs grow monotonically, so ID order is
/// insertion order.
#[derive(Default)]
pub struct InMemoryLobbyRepository {
    store: Mutex<LobbyStore>,
}

impl InMemoryLobbyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LobbyRepository for InMemoryLobbyRepository {
    async fn create_lobby(&self, lobby: NewLobby) -> RepositoryResult<Lobby> {
        let mut store = lock(&self.store);
        store.next_id += 1;
        let lobby = lobby.into_lobby(store.next_id);
        store.lobbies.insert(lobby.id, lobby.clone());
        Ok(lobby)
    }

    async fn get_lobby(&self, lobby_id: LobbyId) -> RepositoryResult<Option<Lobby>> {
        Ok(lock(&self.store).lobbies.get(&lobby_id).cloned())
    }

    async fn update_lobby(&self, lobby: &Lobby) -> RepositoryResult<()> {
        let mut store = lock(&self.store);
        let stored = store
            .lobbies
            .get_mut(&lobby.id)
            .ok_or(RepositoryError::NotFound {
                entity: "lobby",
                id: lobby.id,
            })?;
        *stored = lobby.clone();
        Ok(())
    }

    async fn delete_lobby(&self, lobby_id: LobbyId) -> RepositoryResult<bool> {
        Ok(lock(&self.store).lobbies.remove(&lobby_id).is_some())
    }

    async fn list_lobbies(&self) -> RepositoryResult<Vec<Lobby>> {
        Ok(lock(&self.store).lobbies.values().cloned().collect())
    }

    async fn find_open_by_host(&self, host_id: AccountId) -> RepositoryResult<Option<Lobby>> {
        Ok(lock(&self.store)
            .lobbies
            .values()
            .find(|l| l.host_id == host_id && !l.running)
            .cloned())
    }
}

#[derive(Default)]
struct GameStore {
    games: HashMap<GameId, Game>,
    rounds: BTreeMap<RoundId, Round>,
    next_game_id: GameId,
    next_round_id: RoundId,
}

/// In-memory `GameRepository`
#[derive(Default)]
pub struct InMemoryGameRepository {
    store: Mutex<GameStore>,
}

impl InMemoryGameRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameRepository for InMemoryGameRepository {
    async fn create_game(&self, game: NewGame) -> RepositoryResult<Game> {
        let mut store = lock(&self.store);
        store.next_game_id += 1;
        let game = game.into_game(store.next_game_id);
        store.games.insert(game.id, game.clone());
        Ok(game)
    }

    async fn get_game(&self, game_id: GameId) -> RepositoryResult<Option<Game>> {
        Ok(lock(&self.store).games.get(&game_id).cloned())
    }

    async fn update_game(&self, game: &Game) -> RepositoryResult<()> {
        let mut store = lock(&self.store);
        let stored = store
            .games
            .get_mut(&game.id)
            .ok_or(RepositoryError::NotFound {
                entity: "game",
                id: game.id,
            })?;
        *stored = game.clone();
        Ok(())
    }

    async fn allocate_round_id(&self) -> RepositoryResult<RoundId> {
        let mut store = lock(&self.store);
        store.next_round_id += 1;
        Ok(store.next_round_id)
    }

    async fn save_round(&self, round: &Round) -> RepositoryResult<()> {
        let mut store = lock(&self.store);
        if !store.games.contains_key(&round.game_id) {
            return Err(RepositoryError::NotFound {
                entity: "game",
                id: round.game_id,
            });
        }
        store.rounds.insert(round.id, round.clone());
        Ok(())
    }

    async fn rounds_for_game(&self, game_id: GameId) -> RepositoryResult<Vec<Round>> {
        let mut rounds: Vec<Round> = lock(&self.store)
            .rounds
            .values()
            .filter(|r| r.game_id == game_id)
            .cloned()
            .collect();
        rounds.sort_by_key(|r| r.number);
        Ok(rounds)
    }
}
