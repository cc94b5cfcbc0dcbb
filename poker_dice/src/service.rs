//! `PokerDice` facade: authenticates inbound commands and routes them to the
//! managers.

use log::info;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    auth::{Account, AccountId, AuthError, AuthManager, IssuedToken, RegisterRequest},
    clock::{Clock, SystemClock},
    config::{ConfigError, PokerDiceConfig},
    db::{Repositories, RepositoryError},
    events::{ChannelError, EventChannel, Subscription, Topic, spawn_keep_alive},
    game::{DiceRoller, GameError, GameId, RandomDiceRoller, Scorer},
    lobby::{
        LeaveOutcome, LobbyError, LobbyId, LobbyManager, LobbyServices, LobbySettings,
        LobbySummary, LobbyView, RollOutcome,
    },
    wallet::{WalletError, WalletManager},
};

/// Errors surfaced by the facade
#[derive(Debug, Error)]
pub enum PokerDiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Lobby(#[from] LobbyError),

    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Storage error: {0}")]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Caller may not access the requested resource
    #[error("Forbidden")]
    Forbidden,
}

impl PokerDiceError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            PokerDiceError::Auth(e) => e.client_message(),
            PokerDiceError::Lobby(e) => e.client_message(),
            PokerDiceError::Wallet(e) => e.client_message(),
            PokerDiceError::Repository(_) | PokerDiceError::Config(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for facade operations
pub type PokerDiceResult<T> = Result<T, PokerDiceError>;

/// Entry point wiring authentication, lobbies, wallet and events together
pub struct PokerDice {
    config: PokerDiceConfig,
    auth: AuthManager,
    wallet: WalletManager,
    lobbies: LobbyManager,
    events: EventChannel,
    clock: Arc<dyn Clock>,
}

impl PokerDice {
    /// In-memory storage, system clock and random dice
    pub fn new(config: PokerDiceConfig, scorer: Arc<dyn Scorer>) -> Self {
        Self::with_parts(
            config,
            Repositories::in_memory(),
            Arc::new(SystemClock),
            scorer,
            Arc::new(RandomDiceRoller),
        )
    }

    /// Build from explicit collaborators
    pub fn with_parts(
        config: PokerDiceConfig,
        repos: Repositories,
        clock: Arc<dyn Clock>,
        scorer: Arc<dyn Scorer>,
        roller: Arc<dyn DiceRoller>,
    ) -> Self {
        let events = EventChannel::new(config.events.subscriber_capacity);
        let auth = AuthManager::new(&repos, &config, Arc::clone(&clock));
        let wallet = WalletManager::new(
            Arc::clone(&repos.accounts),
            events.clone(),
            Arc::clone(&clock),
            config.request_timeout,
        );

        let services = LobbyServices {
            repos,
            wallet: wallet.clone(),
            events: events.clone(),
            hasher: auth.hasher().clone(),
            scorer,
            roller,
            clock: Arc::clone(&clock),
            rules: config.game.clone(),
            timeout: config.request_timeout,
        };
        let lobbies = LobbyManager::new(services, config.lobby.clone(), config.request_timeout);

        info!(
            "PokerDice ready: {}..{} players, {}..{} rounds",
            config.lobby.min_players,
            config.lobby.max_players,
            config.lobby.min_rounds,
            config.lobby.max_rounds
        );

        Self {
            config,
            auth,
            wallet,
            lobbies,
            events,
            clock,
        }
    }

    /// Load configuration from the environment and build with in-memory storage
    pub fn from_env(scorer: Arc<dyn Scorer>) -> PokerDiceResult<Self> {
        Ok(Self::new(PokerDiceConfig::from_env()?, scorer))
    }

    pub fn config(&self) -> &PokerDiceConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    pub fn wallet(&self) -> &WalletManager {
        &self.wallet
    }

    pub fn lobbies(&self) -> &LobbyManager {
        &self.lobbies
    }

    pub fn events(&self) -> &EventChannel {
        &self.events
    }

    pub async fn register(&self, request: RegisterRequest) -> PokerDiceResult<Account> {
        Ok(self.auth.register(request).await?)
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> PokerDiceResult<IssuedToken> {
        Ok(self.auth.authenticate(username, password).await?)
    }

    /// Log out
    pub async fn revoke(&self, token: &str) -> PokerDiceResult<()> {
        Ok(self.auth.revoke(token).await?)
    }

    /// Profile of the caller
    pub async fn account(&self, token: &str) -> PokerDiceResult<Account> {
        let account_id = self.caller(token).await?;
        Ok(self.auth.account(account_id).await?)
    }

    pub async fn create_lobby(
        &self,
        token: &str,
        settings: LobbySettings,
    ) -> PokerDiceResult<LobbyId> {
        let host_id = self.caller(token).await?;
        Ok(self.lobbies.create_lobby(host_id, settings).await?)
    }

    pub async fn list_open_lobbies(&self) -> PokerDiceResult<Vec<LobbySummary>> {
        Ok(self.lobbies.list_open_lobbies().await?)
    }

    pub async fn get_lobby(&self, lobby_id: LobbyId) -> PokerDiceResult<LobbyView> {
        Ok(self.lobbies.get_lobby(lobby_id).await?)
    }

    pub async fn join(
        &self,
        token: &str,
        lobby_id: LobbyId,
        password: Option<String>,
    ) -> PokerDiceResult<usize> {
        let account_id = self.caller(token).await?;
        Ok(self.lobbies.join(lobby_id, account_id, password).await?)
    }

    pub async fn leave(&self, token: &str, lobby_id: LobbyId) -> PokerDiceResult<LeaveOutcome> {
        let account_id = self.caller(token).await?;
        Ok(self.lobbies.leave(lobby_id, account_id).await?)
    }

    pub async fn start_game(&self, token: &str, lobby_id: LobbyId) -> PokerDiceResult<GameId> {
        let account_id = self.caller(token).await?;
        Ok(self.lobbies.start_game(lobby_id, account_id).await?)
    }

    pub async fn roll_dice(
        &self,
        token: &str,
        lobby_id: LobbyId,
        keep: Vec<usize>,
    ) -> PokerDiceResult<RollOutcome> {
        let account_id = self.caller(token).await?;
        Ok(self.lobbies.roll(lobby_id, account_id, keep).await?)
    }

    pub async fn stand_turn(&self, token: &str, lobby_id: LobbyId) -> PokerDiceResult<()> {
        let account_id = self.caller(token).await?;
        Ok(self.lobbies.stand(lobby_id, account_id).await?)
    }

    /// Add credit to the caller's account.
    ///
    /// Without an idempotency key a fresh one is generated, so the call is
    /// never deduplicated.
    pub async fn deposit(
        &self,
        token: &str,
        amount: i64,
        idempotency_key: Option<String>,
    ) -> PokerDiceResult<i64> {
        let account_id = self.caller(token).await?;
        let key = idempotency_key.unwrap_or_else(|| Uuid::new_v4().to_string());
        Ok(self.wallet.deposit(account_id, amount, key).await?)
    }

    /// Subscribe to a topic. Account topics are only open to their owner.
    pub async fn subscribe(&self, token: &str, topic: Topic) -> PokerDiceResult<Subscription> {
        let account_id = self.caller(token).await?;
        if let Topic::Account(owner) = topic
            && owner != account_id
        {
            return Err(PokerDiceError::Forbidden);
        }
        Ok(self.events.subscribe(topic)?)
    }

    /// Start the idle keep-alive ticker on the event channel
    pub fn spawn_keep_alive(&self) -> JoinHandle<()> {
        spawn_keep_alive(
            self.events.clone(),
            self.config.events.keep_alive_interval,
            Arc::clone(&self.clock),
        )
    }

    /// Complete the event channel; every subscription ends with `Completed`
    pub fn shutdown(&self) {
        info!("PokerDice shutting down");
        self.events.complete();
    }

    async fn caller(&self, token: &str) -> PokerDiceResult<AccountId> {
        Ok(self.auth.validate_token(token).await?)
    }
}
