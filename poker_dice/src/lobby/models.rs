//! Lobby data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    auth::AccountId,
    config::LobbyLimits,
    game::{GameId, GameSnapshot},
};

/// Lobby ID type
pub type LobbyId = i64;

/// Settings chosen by the host when creating a lobby
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySettings {
    pub name: String,
    pub description: String,
    pub min_players: usize,
    pub max_players: usize,
    /// Number of rounds in the game
    pub rounds: u8,
    /// Credit needed to join; also the bet of every round
    pub min_credit: i64,
    /// Time budget of a single turn
    pub turn_time_secs: u64,
    /// Makes the lobby private when set
    pub password: Option<String>,
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            name: "Poker Dice".to_string(),
            description: String::new(),
            min_players: 2,
            max_players: 4,
            rounds: 3,
            min_credit: 10,
            turn_time_secs: 60,
            password: None,
        }
    }
}

impl LobbySettings {
    /// Validate settings against the configured bounds
    pub fn validate(&self, limits: &LobbyLimits) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Lobby name must not be blank".to_string());
        }

        if self.name.chars().count() > 64 {
            return Err("Lobby name must be at most 64 characters".to_string());
        }

        if self.min_players < limits.min_players {
            return Err(format!(
                "Min players must be at least {}",
                limits.min_players
            ));
        }

        if self.max_players < self.min_players || self.max_players > limits.max_players {
            return Err(format!(
                "Max players must be between min players ({}) and {}",
                self.min_players, limits.max_players
            ));
        }

        if self.rounds < limits.min_rounds || self.rounds > limits.max_rounds {
            return Err(format!(
                "Rounds must be between {} and {}",
                limits.min_rounds, limits.max_rounds
            ));
        }

        if self.min_credit < limits.min_credit {
            return Err(format!(
                "Min credit must be at least {}",
                limits.min_credit
            ));
        }

        let turn_time = self.turn_time();
        if turn_time < limits.min_turn_time || turn_time > limits.max_turn_time {
            return Err(format!(
                "Turn time must be between {} and {} seconds",
                limits.min_turn_time.as_secs(),
                limits.max_turn_time.as_secs()
            ));
        }

        if let Some(password) = &self.password
            && password.is_empty()
        {
            return Err("Password of a private lobby must not be empty".to_string());
        }

        Ok(())
    }

    pub fn turn_time(&self) -> Duration {
        Duration::from_secs(self.turn_time_secs)
    }
}

/// Lobby record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lobby {
    pub id: LobbyId,
    pub name: String,
    pub description: String,
    pub host_id: AccountId,
    /// Argon2id hash of the lobby password; present iff the lobby is private
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub min_players: usize,
    pub max_players: usize,
    pub rounds: u8,
    pub min_credit: i64,
    pub turn_time_secs: u64,
    pub running: bool,
    /// Members in join order, which is also the turn rotation order
    pub members: Vec<AccountId>,
    pub game_id: Option<GameId>,
    pub created_at: DateTime<Utc>,
}

impl Lobby {
    pub fn is_private(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_players
    }

    pub fn is_member(&self, account_id: AccountId) -> bool {
        self.members.contains(&account_id)
    }

    /// Visible in the open lobby listing
    pub fn is_open(&self) -> bool {
        !self.running && !self.is_full()
    }

    pub fn turn_time(&self) -> Duration {
        Duration::from_secs(self.turn_time_secs)
    }

    pub fn summary(&self) -> LobbySummary {
        LobbySummary {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            host_id: self.host_id,
            is_private: self.is_private(),
            player_count: self.members.len(),
            min_players: self.min_players,
            max_players: self.max_players,
            rounds: self.rounds,
            min_credit: self.min_credit,
            turn_time_secs: self.turn_time_secs,
            running: self.running,
        }
    }
}

/// Lobby as handed to storage before an ID is assigned
#[derive(Debug, Clone)]
pub struct NewLobby {
    pub name: String,
    pub description: String,
    pub host_id: AccountId,
    pub password_hash: Option<String>,
    pub min_players: usize,
    pub max_players: usize,
    pub rounds: u8,
    pub min_credit: i64,
    pub turn_time_secs: u64,
    pub created_at: DateTime<Utc>,
}

impl NewLobby {
    pub fn into_lobby(self, id: LobbyId) -> Lobby {
        Lobby {
            id,
            name: self.name,
            description: self.description,
            host_id: self.host_id,
            password_hash: self.password_hash,
            min_players: self.min_players,
            max_players: self.max_players,
            rounds: self.rounds,
            min_credit: self.min_credit,
            turn_time_secs: self.turn_time_secs,
            running: false,
            members: vec![self.host_id],
            game_id: None,
            created_at: self.created_at,
        }
    }
}

/// Public lobby information for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySummary {
    pub id: LobbyId,
    pub name: String,
    pub description: String,
    pub host_id: AccountId,
    pub is_private: bool,
    pub player_count: usize,
    pub min_players: usize,
    pub max_players: usize,
    pub rounds: u8,
    pub min_credit: i64,
    pub turn_time_secs: u64,
    pub running: bool,
}

/// Detailed lobby state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LobbyView {
    pub summary: LobbySummary,
    pub members: Vec<AccountId>,
    pub game: Option<GameSnapshot>,
}

/// What happened when a member left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LeaveOutcome {
    /// Member removed; during a game this forfeits the member's seat
    Left,
    /// The lobby was deleted: the host left before the game started, or the
    /// leave ended the game
    LobbyClosed,
    /// Host left a running game; the host role moved on
    HostLeftRunningGame { new_host: AccountId },
}
