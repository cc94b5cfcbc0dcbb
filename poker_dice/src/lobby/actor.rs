//! Lobby actor implementation with async message handling.

use log::{debug, error, info, warn};
use std::{collections::HashMap, future, sync::Arc, time::Duration};
use tokio::{
    sync::{RwLock, mpsc},
    time::{Instant, sleep_until},
};

use super::{
    errors::{LobbyError, LobbyResult},
    messages::{LobbyMessage, RollOutcome},
    models::{LeaveOutcome, Lobby, LobbyId, LobbyView},
};
use crate::{
    auth::{AccountId, PepperedHasher},
    clock::Clock,
    config::GameRules,
    db::{Repositories, with_timeout},
    events::{
        DomainEvent, EventChannel, LobbyDeleted, LobbyUpdated, PlayerJoined, PlayerLeft, Topic,
    },
    game::{
        DiceRoller, GameError, GameId, GameMachine, GameTransition, NewGame, Scorer, split_pot,
    },
    wallet::{WalletError, WalletManager},
};

const INBOX_CAPACITY: usize = 100;

/// Live lobby actors by lobby ID
pub type LobbyRegistry = Arc<RwLock<HashMap<LobbyId, LobbyHandle>>>;

/// Collaborators shared by the lobby manager and every lobby actor
#[derive(Clone)]
pub struct LobbyServices {
    pub repos: Repositories,
    pub wallet: WalletManager,
    pub events: EventChannel,
    /// Hashes and verifies lobby passwords
    pub hasher: PepperedHasher,
    pub scorer: Arc<dyn Scorer>,
    pub roller: Arc<dyn DiceRoller>,
    pub clock: Arc<dyn Clock>,
    pub rules: GameRules,
    /// Upper bound for each repository call
    pub timeout: Duration,
}

/// Lobby actor handle for sending messages
#[derive(Clone)]
pub struct LobbyHandle {
    sender: mpsc::Sender<LobbyMessage>,
    lobby_id: LobbyId,
}

impl LobbyHandle {
    pub fn new(sender: mpsc::Sender<LobbyMessage>, lobby_id: LobbyId) -> Self {
        Self { sender, lobby_id }
    }

    pub fn lobby_id(&self) -> LobbyId {
        self.lobby_id
    }

    /// Send a message to the lobby; fails once the actor has stopped
    pub async fn send(&self, message: LobbyMessage) -> LobbyResult<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| LobbyError::NotFound)
    }
}

/// Actor owning one lobby and, once started, its game
pub struct LobbyActor {
    lobby: Lobby,

    /// Game state machine, present once the host started the game
    game: Option<GameMachine>,

    /// Message inbox
    inbox: mpsc::Receiver<LobbyMessage>,

    services: LobbyServices,

    /// Registry the actor removes itself from when the lobby goes away
    registry: LobbyRegistry,

    /// Serial and deadline of the active turn
    turn_deadline: Option<(u64, Instant)>,

    is_closed: bool,
}

impl LobbyActor {
    /// Create a new lobby actor
    ///
    /// # Returns
    ///
    /// * `(LobbyActor, LobbyHandle)` - Actor to spawn and the handle to reach it
    pub fn new(
        lobby: Lobby,
        services: LobbyServices,
        registry: LobbyRegistry,
    ) -> (Self, LobbyHandle) {
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        let handle = LobbyHandle::new(sender, lobby.id);

        let actor = Self {
            lobby,
            game: None,
            inbox,
            services,
            registry,
            turn_deadline: None,
            is_closed: false,
        };

        (actor, handle)
    }

    /// Run the actor until the lobby is deleted or every handle is dropped
    pub async fn run(mut self) {
        info!("Lobby {} '{}' starting", self.lobby.id, self.lobby.name);

        loop {
            let deadline = self.turn_deadline.map(|(_, at)| at);

            tokio::select! {
                message = self.inbox.recv() => {
                    let Some(message) = message else {
                        break;
                    };
                    self.handle_message(message).await;
                }

                _ = wait_until(deadline) => {
                    self.handle_turn_timeout().await;
                }
            }

            if self.is_closed {
                break;
            }
        }

        // Answer requests that were queued before the shutdown
        self.inbox.close();
        while let Ok(message) = self.inbox.try_recv() {
            self.handle_message(message).await;
        }

        info!("Lobby {} '{}' closed", self.lobby.id, self.lobby.name);
    }

    async fn handle_message(&mut self, message: LobbyMessage) {
        match message {
            LobbyMessage::Join {
                account_id,
                password,
                response,
            } => {
                let result = self.handle_join(account_id, password).await;
                let _ = response.send(result);
            }

            LobbyMessage::Leave {
                account_id,
                response,
            } => {
                let result = self.handle_leave(account_id).await;
                let _ = response.send(result);
            }

            LobbyMessage::StartGame {
                requester,
                response,
            } => {
                let result = self.handle_start(requester).await;
                let _ = response.send(result);
            }

            LobbyMessage::Roll {
                player,
                keep,
                response,
            } => {
                let result = self.handle_roll(player, keep).await;
                let _ = response.send(result);
            }

            LobbyMessage::Stand { player, response } => {
                let result = self.handle_stand(player).await;
                let _ = response.send(result);
            }

            LobbyMessage::GetView { response } => {
                let _ = response.send(self.view());
            }
        }
    }

    fn ensure_open(&self) -> LobbyResult<()> {
        if self.is_closed {
            Err(LobbyError::NotFound)
        } else {
            Ok(())
        }
    }

    fn view(&self) -> LobbyResult<LobbyView> {
        self.ensure_open()?;
        Ok(LobbyView {
            summary: self.lobby.summary(),
            members: self.lobby.members.clone(),
            game: self.game.as_ref().map(GameMachine::snapshot),
        })
    }

    /// Handle join lobby request
    async fn handle_join(
        &mut self,
        account_id: AccountId,
        password: Option<String>,
    ) -> LobbyResult<usize> {
        self.ensure_open()?;

        if self.lobby.running {
            return Err(LobbyError::AlreadyRunning);
        }
        if self.lobby.is_member(account_id) {
            return Err(LobbyError::AlreadyMember);
        }
        if self.lobby.is_full() {
            return Err(LobbyError::Full);
        }

        if let Some(hash) = &self.lobby.password_hash {
            let granted = password
                .as_deref()
                .is_some_and(|password| self.services.hasher.verify(password, hash));
            if !granted {
                return Err(LobbyError::WrongPassword);
            }
        }

        let available = self.services.wallet.balance(account_id).await?;
        if available < self.lobby.min_credit {
            return Err(LobbyError::InsufficientCredit {
                required: self.lobby.min_credit,
                available,
            });
        }

        let claimed = with_timeout(
            self.services.timeout,
            self.services
                .repos
                .accounts
                .claim_lobby(account_id, self.lobby.id),
        )
        .await?;
        if !claimed {
            return Err(LobbyError::BusyInAnotherLobby);
        }

        self.lobby.members.push(account_id);
        self.persist_lobby().await;

        let player_count = self.lobby.members.len();
        debug!(
            "Account {account_id} joined lobby {} ({player_count}/{})",
            self.lobby.id, self.lobby.max_players
        );
        self.emit(PlayerJoined {
            lobby_id: self.lobby.id,
            account_id,
            player_count,
        });
        self.announce_update();

        Ok(player_count)
    }

    /// Handle leave lobby request
    async fn handle_leave(&mut self, account_id: AccountId) -> LobbyResult<LeaveOutcome> {
        self.ensure_open()?;

        let Some(position) = self.lobby.members.iter().position(|&m| m == account_id) else {
            return Err(LobbyError::NotMember);
        };
        let is_host = account_id == self.lobby.host_id;

        if is_host && !self.lobby.running {
            info!("Host {account_id} left lobby {}, deleting it", self.lobby.id);
            self.shutdown().await;
            return Ok(LeaveOutcome::LobbyClosed);
        }

        self.lobby.members.remove(position);
        self.release(account_id).await;

        // The member after the old host takes over, wrapping around
        let new_host = if is_host {
            self.lobby
                .members
                .get(position)
                .or_else(|| self.lobby.members.first())
                .copied()
        } else {
            None
        };
        if let Some(host) = new_host {
            info!(
                "Host of running lobby {} passed from {account_id} to {host}",
                self.lobby.id
            );
            self.lobby.host_id = host;
        }

        self.persist_lobby().await;
        self.emit(PlayerLeft {
            lobby_id: self.lobby.id,
            account_id,
            player_count: self.lobby.members.len(),
            new_host,
        });
        self.announce_update();

        if let Some(machine) = self.game.as_mut() {
            match machine.remove_player(account_id) {
                Ok(transitions) => self.process(transitions).await,
                Err(e) => debug!(
                    "Account {account_id} left lobby {} without a seat in its game: {e}",
                    self.lobby.id
                ),
            }
        }

        // The leave may have ended the game and with it the lobby
        Ok(match new_host {
            _ if self.is_closed => LeaveOutcome::LobbyClosed,
            Some(new_host) => LeaveOutcome::HostLeftRunningGame { new_host },
            None => LeaveOutcome::Left,
        })
    }

    /// Handle start game request
    async fn handle_start(&mut self, requester: AccountId) -> LobbyResult<GameId> {
        self.ensure_open()?;

        if requester != self.lobby.host_id {
            return Err(LobbyError::NotHost);
        }
        if self.lobby.running {
            return Err(LobbyError::AlreadyRunning);
        }

        let joined = self.lobby.members.len();
        let required = self.lobby.min_players.max(2);
        if joined < required {
            return Err(LobbyError::NotEnoughPlayers { required, joined });
        }

        let game = with_timeout(
            self.services.timeout,
            self.services.repos.games.create_game(NewGame {
                lobby_id: self.lobby.id,
                players: self.lobby.members.clone(),
                min_credit: self.lobby.min_credit,
                total_rounds: self.lobby.rounds,
                created_at: self.services.clock.now(),
            }),
        )
        .await?;
        let game_id = game.id;

        let mut machine = GameMachine::new(
            game,
            self.services.rules.clone(),
            Arc::clone(&self.services.scorer),
        );
        let transitions = machine.start()?;

        self.lobby.running = true;
        self.lobby.game_id = Some(game_id);
        self.game = Some(machine);
        self.persist_lobby().await;
        self.announce_update();

        info!(
            "Lobby {} started game {game_id} with {joined} players",
            self.lobby.id
        );
        self.process(transitions).await;

        Ok(game_id)
    }

    async fn handle_roll(
        &mut self,
        player: AccountId,
        keep: Vec<usize>,
    ) -> LobbyResult<RollOutcome> {
        let machine = self.game.as_mut().ok_or(GameError::NotRunning)?;
        let transitions = machine.roll(player, &keep, self.services.roller.as_ref())?;

        let mut outcome = None;
        let mut turn_finished = false;
        for transition in &transitions {
            match transition {
                GameTransition::DiceRolled {
                    dice,
                    value,
                    roll_count,
                    ..
                } => {
                    outcome = Some((dice.clone(), *value, *roll_count));
                }
                GameTransition::TurnFinished { .. } => turn_finished = true,
                _ => {}
            }
        }

        self.process(transitions).await;

        let (dice, value, roll_count) = outcome.ok_or(GameError::NotRunning)?;
        Ok(RollOutcome {
            dice,
            value,
            roll_count,
            turn_finished,
        })
    }

    async fn handle_stand(&mut self, player: AccountId) -> LobbyResult<()> {
        let machine = self.game.as_mut().ok_or(GameError::NotRunning)?;
        let transitions = machine.stand(player)?;
        self.process(transitions).await;
        Ok(())
    }

    async fn handle_turn_timeout(&mut self) {
        let Some((serial, _)) = self.turn_deadline.take() else {
            return;
        };
        let Some(machine) = self.game.as_mut() else {
            return;
        };

        let transitions = machine.time_out(serial);
        self.process(transitions).await;
    }

    /// Apply machine transitions, open further rounds and re-arm the turn timer
    async fn process(&mut self, transitions: Vec<GameTransition>) {
        let mut pending = transitions;

        loop {
            self.publish(pending).await;
            self.persist_game().await;

            if !self.game.as_ref().is_some_and(GameMachine::needs_round) {
                break;
            }
            pending = self.open_round().await;
        }

        self.schedule_turn_timer();

        if self.game.as_ref().is_some_and(GameMachine::is_ended) {
            self.shutdown().await;
        }
    }

    /// Settle credits for the transitions and announce each of them
    async fn publish(&mut self, transitions: Vec<GameTransition>) {
        let Some(game_id) = self.game.as_ref().map(|machine| machine.game().id) else {
            return;
        };

        for transition in transitions {
            match &transition {
                GameTransition::RoundClosed {
                    number,
                    winners,
                    pot,
                    ..
                } => {
                    self.pay_out(game_id, *number, *pot, winners).await;
                }
                GameTransition::Ended {
                    winners, reason, ..
                } => {
                    info!("Game {game_id} ended ({reason:?}), winners {winners:?}");
                    for winner in winners {
                        if let Err(e) = with_timeout(
                            self.services.timeout,
                            self.services.repos.accounts.increment_wins(*winner),
                        )
                        .await
                        {
                            error!("Win of account {winner} in game {game_id} not recorded: {e}");
                        }
                    }
                }
                _ => {}
            }

            self.emit(DomainEvent::from_transition(
                self.lobby.id,
                game_id,
                transition,
            ));
        }
    }

    async fn pay_out(&self, game_id: GameId, round_number: u8, pot: i64, winners: &[AccountId]) {
        for (winner, amount) in split_pot(pot, winners) {
            if amount <= 0 {
                continue;
            }
            if let Err(e) = self
                .services
                .wallet
                .payout(winner, game_id, round_number, amount)
                .await
            {
                error!(
                    "Payout of {amount} to {winner} for round {round_number} of game {game_id} failed: {e}"
                );
            }
        }
    }

    /// Collect antes and open the next round.
    ///
    /// If the round cannot be opened the collected antes are refunded and
    /// the game is abandoned.
    async fn open_round(&mut self) -> Vec<GameTransition> {
        let Some(game) = self.game.as_ref().map(GameMachine::game) else {
            return vec![];
        };
        let game_id = game.id;
        let number = game.round_counter + 1;
        let bet = game.min_credit;
        let players = game.players.clone();

        let round_id = match with_timeout(
            self.services.timeout,
            self.services.repos.games.allocate_round_id(),
        )
        .await
        {
            Ok(round_id) => round_id,
            Err(e) => {
                error!("Round {number} of game {game_id} not opened, abandoning game: {e}");
                return self.abandon_game();
            }
        };

        let mut paid = Vec::with_capacity(players.len());
        for player in players {
            match self
                .services
                .wallet
                .pay_ante(player, game_id, number, bet)
                .await
            {
                Ok(_) => paid.push(player),
                Err(WalletError::InsufficientCredit { available, .. }) => {
                    debug!("Player {player} cannot cover bet {bet} of game {game_id} ({available})");
                }
                Err(e) => warn!("Ante of player {player} in game {game_id} failed: {e}"),
            }
        }

        let turn_time_secs = self.lobby.turn_time_secs;
        let result = self
            .game
            .as_mut()
            .map(|machine| machine.open_round(round_id, &paid, turn_time_secs));

        let transitions = match result {
            Some(Ok(transitions)) => transitions,
            Some(Err(e)) => {
                error!("Round {number} of game {game_id} rejected, abandoning game: {e}");
                self.refund(game_id, number, bet, &paid).await;
                return self.abandon_game();
            }
            None => return vec![],
        };

        let opened = transitions
            .iter()
            .any(|t| matches!(t, GameTransition::RoundOpened { .. }));
        if !opened {
            self.refund(game_id, number, bet, &paid).await;
        }

        transitions
    }

    fn abandon_game(&mut self) -> Vec<GameTransition> {
        self.game
            .as_mut()
            .map(GameMachine::abandon)
            .unwrap_or_default()
    }

    async fn refund(&self, game_id: GameId, round_number: u8, bet: i64, players: &[AccountId]) {
        for &player in players {
            if let Err(e) = self
                .services
                .wallet
                .refund(player, game_id, round_number, bet)
                .await
            {
                error!("Refund of {bet} to {player} in game {game_id} failed: {e}");
            }
        }
    }

    fn schedule_turn_timer(&mut self) {
        let active = self.game.as_ref().and_then(GameMachine::active_turn);

        self.turn_deadline = match (active, self.turn_deadline) {
            (Some((_, serial)), Some((armed, at))) if armed == serial => Some((armed, at)),
            (Some((player, serial)), _) => {
                debug!(
                    "Lobby {}: turn of {player} ends in {}s",
                    self.lobby.id, self.lobby.turn_time_secs
                );
                Some((serial, Instant::now() + self.lobby.turn_time()))
            }
            (None, _) => None,
        };
    }

    /// Delete the lobby and stop accepting requests
    async fn shutdown(&mut self) {
        let lobby_id = self.lobby.id;

        for member in self.lobby.members.clone() {
            self.release(member).await;
        }

        if let Err(e) = with_timeout(
            self.services.timeout,
            self.services.repos.lobbies.delete_lobby(lobby_id),
        )
        .await
        {
            error!("Lobby {lobby_id} not deleted from storage: {e}");
        }

        self.registry.write().await.remove(&lobby_id);

        self.emit(LobbyDeleted { lobby_id });
        self.services.events.close_topic(Topic::Lobby(lobby_id));

        self.turn_deadline = None;
        self.is_closed = true;
    }

    async fn release(&self, account_id: AccountId) {
        if let Err(e) = with_timeout(
            self.services.timeout,
            self.services
                .repos
                .accounts
                .release_lobby(account_id, self.lobby.id),
        )
        .await
        {
            error!(
                "Account {account_id} not released from lobby {}: {e}",
                self.lobby.id
            );
        }
    }

    async fn persist_lobby(&self) {
        if let Err(e) = with_timeout(
            self.services.timeout,
            self.services.repos.lobbies.update_lobby(&self.lobby),
        )
        .await
        {
            error!("Lobby {} not persisted: {e}", self.lobby.id);
        }
    }

    async fn persist_game(&self) {
        let Some(machine) = &self.game else {
            return;
        };
        let games = &self.services.repos.games;

        if let Err(e) = with_timeout(self.services.timeout, games.update_game(machine.game())).await
        {
            error!("Game {} not persisted: {e}", machine.game().id);
        }
        if let Some(round) = machine.round()
            && let Err(e) = with_timeout(self.services.timeout, games.save_round(round)).await
        {
            error!("Round {} not persisted: {e}", round.id);
        }
    }

    /// Tell lobby list watchers about changed membership, host or state
    fn announce_update(&self) {
        self.emit(LobbyUpdated {
            lobby: self.lobby.summary(),
        });
    }

    fn emit(&self, event: impl Into<DomainEvent>) {
        if let Err(e) = self.services.events.emit(event) {
            warn!("Lobby {}: event not delivered: {e}", self.lobby.id);
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => future::pending().await,
    }
}
