//! Lobby manager for spawning and routing requests to lobby actors.

use log::{error, info, warn};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{Mutex, RwLock, oneshot};

use super::{
    actor::{LobbyActor, LobbyHandle, LobbyRegistry, LobbyServices},
    errors::{LobbyError, LobbyResult},
    messages::{LobbyMessage, RollOutcome},
    models::{LeaveOutcome, Lobby, LobbyId, LobbySettings, LobbySummary, LobbyView, NewLobby},
};
use crate::{
    auth::AccountId,
    config::LobbyLimits,
    db::with_timeout,
    events::LobbyCreated,
    game::GameId,
};

/// Lobby manager for managing multiple lobby actors
pub struct LobbyManager {
    services: LobbyServices,

    /// Bounds lobby settings are validated against
    limits: LobbyLimits,

    /// Upper bound for a single request to a lobby actor
    request_timeout: Duration,

    /// Active lobby handles
    lobbies: LobbyRegistry,

    /// Serializes lobby creation so a host cannot open two lobbies at once
    creation_lock: Mutex<()>,
}

impl LobbyManager {
    /// Create a new lobby manager
    ///
    /// # Arguments
    ///
    /// * `services` - Collaborators handed to every lobby actor
    /// * `limits` - Bounds for lobby settings
    /// * `request_timeout` - Upper bound for each request to a lobby actor
    pub fn new(services: LobbyServices, limits: LobbyLimits, request_timeout: Duration) -> Self {
        Self {
            services,
            limits,
            request_timeout,
            lobbies: Arc::new(RwLock::new(HashMap::new())),
            creation_lock: Mutex::new(()),
        }
    }

    /// Create a lobby and spawn its actor
    ///
    /// # Arguments
    ///
    /// * `host_id` - Account creating the lobby; becomes its first member
    /// * `settings` - Lobby settings
    ///
    /// # Returns
    ///
    /// * `LobbyResult<LobbyId>` - ID of the new lobby
    ///
    /// # Errors
    ///
    /// * `LobbyError::InvalidSettings` - Settings outside the configured bounds
    /// * `LobbyError::HostAlreadyHostingOpenLobby` - Host already hosts a lobby that has not started
    /// * `LobbyError::InsufficientCredit` - Host cannot cover the lobby's minimum credit
    /// * `LobbyError::BusyInAnotherLobby` - Host sits in another lobby
    pub async fn create_lobby(
        &self,
        host_id: AccountId,
        settings: LobbySettings,
    ) -> LobbyResult<LobbyId> {
        settings
            .validate(&self.limits)
            .map_err(LobbyError::InvalidSettings)?;

        let _guard = self.creation_lock.lock().await;
        let repos = &self.services.repos;
        let timeout = self.services.timeout;

        if with_timeout(timeout, repos.lobbies.find_open_by_host(host_id))
            .await?
            .is_some()
        {
            return Err(LobbyError::HostAlreadyHostingOpenLobby);
        }

        let available = self.services.wallet.balance(host_id).await?;
        if available < settings.min_credit {
            return Err(LobbyError::InsufficientCredit {
                required: settings.min_credit,
                available,
            });
        }

        let password_hash = match &settings.password {
            Some(password) => Some(
                self.services
                    .hasher
                    .hash(password)
                    .map_err(|_| LobbyError::HashingFailed)?,
            ),
            None => None,
        };

        let lobby = with_timeout(
            timeout,
            repos.lobbies.create_lobby(NewLobby {
                name: settings.name.trim().to_string(),
                description: settings.description,
                host_id,
                password_hash,
                min_players: settings.min_players,
                max_players: settings.max_players,
                rounds: settings.rounds,
                min_credit: settings.min_credit,
                turn_time_secs: settings.turn_time_secs,
                created_at: self.services.clock.now(),
            }),
        )
        .await?;

        let claimed = with_timeout(timeout, repos.accounts.claim_lobby(host_id, lobby.id)).await;
        if !matches!(claimed, Ok(true)) {
            if let Err(e) = with_timeout(timeout, repos.lobbies.delete_lobby(lobby.id)).await {
                error!("Unclaimed lobby {} not removed: {e}", lobby.id);
            }
            return match claimed {
                Err(e) => Err(e.into()),
                _ => Err(LobbyError::BusyInAnotherLobby),
            };
        }

        let lobby_id = lobby.id;
        let summary = lobby.summary();
        let (actor, handle) =
            LobbyActor::new(lobby, self.services.clone(), Arc::clone(&self.lobbies));
        self.lobbies.write().await.insert(lobby_id, handle);
        tokio::spawn(actor.run());

        info!(
            "Created lobby {lobby_id} '{}' hosted by {host_id}",
            summary.name
        );
        if let Err(e) = self.services.events.emit(LobbyCreated { lobby: summary }) {
            warn!("Creation of lobby {lobby_id} not announced: {e}");
        }

        Ok(lobby_id)
    }

    /// Lobbies that have not started and still have room, in creation order
    pub async fn list_open_lobbies(&self) -> LobbyResult<Vec<LobbySummary>> {
        let lobbies = with_timeout(
            self.services.timeout,
            self.services.repos.lobbies.list_lobbies(),
        )
        .await?;

        Ok(lobbies
            .iter()
            .filter(|lobby| lobby.is_open())
            .map(Lobby::summary)
            .collect())
    }

    /// Lobby details, including a game snapshot once it runs
    pub async fn get_lobby(&self, lobby_id: LobbyId) -> LobbyResult<LobbyView> {
        self.request(lobby_id, |response| LobbyMessage::GetView { response })
            .await
    }

    /// Join a lobby
    ///
    /// # Returns
    ///
    /// * `LobbyResult<usize>` - Member count after joining
    pub async fn join(
        &self,
        lobby_id: LobbyId,
        account_id: AccountId,
        password: Option<String>,
    ) -> LobbyResult<usize> {
        self.request(lobby_id, |response| LobbyMessage::Join {
            account_id,
            password,
            response,
        })
        .await
    }

    /// Leave a lobby
    pub async fn leave(
        &self,
        lobby_id: LobbyId,
        account_id: AccountId,
    ) -> LobbyResult<LeaveOutcome> {
        self.request(lobby_id, |response| LobbyMessage::Leave {
            account_id,
            response,
        })
        .await
    }

    /// Start the lobby's game; only the host may do this
    pub async fn start_game(
        &self,
        lobby_id: LobbyId,
        requester: AccountId,
    ) -> LobbyResult<GameId> {
        self.request(lobby_id, |response| LobbyMessage::StartGame {
            requester,
            response,
        })
        .await
    }

    /// Roll the dice for the active turn
    ///
    /// # Arguments
    ///
    /// * `lobby_id` - Lobby running the game
    /// * `player` - Rolling player
    /// * `keep` - Positions of the previous roll to keep
    pub async fn roll(
        &self,
        lobby_id: LobbyId,
        player: AccountId,
        keep: Vec<usize>,
    ) -> LobbyResult<RollOutcome> {
        self.request(lobby_id, |response| LobbyMessage::Roll {
            player,
            keep,
            response,
        })
        .await
    }

    /// End the active turn with its latest roll
    pub async fn stand(&self, lobby_id: LobbyId, player: AccountId) -> LobbyResult<()> {
        self.request(lobby_id, |response| LobbyMessage::Stand { player, response })
            .await
    }

    /// Number of live lobby actors
    pub async fn active_lobby_count(&self) -> usize {
        self.lobbies.read().await.len()
    }

    async fn get_handle(&self, lobby_id: LobbyId) -> Option<LobbyHandle> {
        self.lobbies.read().await.get(&lobby_id).cloned()
    }

    /// Send a message to a lobby actor and wait for its answer
    async fn request<T>(
        &self,
        lobby_id: LobbyId,
        build: impl FnOnce(oneshot::Sender<LobbyResult<T>>) -> LobbyMessage,
    ) -> LobbyResult<T> {
        let handle = self
            .get_handle(lobby_id)
            .await
            .ok_or(LobbyError::NotFound)?;

        let (tx, rx) = oneshot::channel();
        let exchange = async {
            match handle.send(build(tx)).await {
                Ok(()) => rx.await.unwrap_or(Err(LobbyError::NotFound)),
                Err(e) => Err(e),
            }
        };

        tokio::time::timeout(self.request_timeout, exchange)
            .await
            .unwrap_or(Err(LobbyError::Timeout))
    }
}
