//! Game, round and turn data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{dice::Die, scoring::Score};
use crate::{auth::AccountId, lobby::LobbyId};

/// Game ID type
pub type GameId = i64;

/// Round ID type
pub type RoundId = i64;

/// Game lifecycle. Only moves forward.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    Running,
    Ended,
}

/// Why a game ended
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameEndReason {
    /// All configured rounds were played
    RoundsPlayed,
    /// Fewer than two players were left
    Forfeit,
    /// The next round could not be opened; nobody wins
    Aborted,
}

/// A match spawned from a started lobby
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub lobby_id: LobbyId,
    pub status: GameStatus,
    /// Remaining players in rotation order
    pub players: Vec<AccountId>,
    pub min_credit: i64,
    /// Rounds opened so far
    pub round_counter: u8,
    pub total_rounds: u8,
    pub round_wins: BTreeMap<AccountId, u32>,
    pub winners: Vec<AccountId>,
    pub end_reason: Option<GameEndReason>,
    pub created_at: DateTime<Utc>,
}

impl Game {
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_player(&self, account_id: AccountId) -> bool {
        self.players.contains(&account_id)
    }
}

/// Game as handed to storage before an ID is assigned
#[derive(Clone, Debug)]
pub struct NewGame {
    pub lobby_id: LobbyId,
    pub players: Vec<AccountId>,
    pub min_credit: i64,
    pub total_rounds: u8,
    pub created_at: DateTime<Utc>,
}

impl NewGame {
    pub fn into_game(self, id: GameId) -> Game {
        Game {
            id,
            lobby_id: self.lobby_id,
            status: GameStatus::Waiting,
            round_wins: self.players.iter().map(|&player| (player, 0)).collect(),
            players: self.players,
            min_credit: self.min_credit,
            round_counter: 0,
            total_rounds: self.total_rounds,
            winners: vec![],
            end_reason: None,
            created_at: self.created_at,
        }
    }
}

/// Round lifecycle
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Open,
    Closed,
}

/// One scoring cycle within a game
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub game_id: GameId,
    /// 1-based position within the game
    pub number: u8,
    pub bet: i64,
    pub pot: i64,
    pub status: RoundStatus,
    /// Empty until the round closes
    pub winners: Vec<AccountId>,
    pub time_budget_secs: u64,
    /// Turn order for this round
    pub order: Vec<AccountId>,
    /// Turns in the order they were played
    pub turns: Vec<Turn>,
}

impl Round {
    pub fn is_closed(&self) -> bool {
        self.status == RoundStatus::Closed
    }

    pub fn active_turn(&self) -> Option<&Turn> {
        self.turns.iter().find(|turn| turn.is_active())
    }

    pub(crate) fn active_turn_mut(&mut self) -> Option<&mut Turn> {
        self.turns.iter_mut().find(|turn| turn.is_active())
    }

    pub fn turn_of(&self, player: AccountId) -> Option<&Turn> {
        self.turns.iter().find(|turn| turn.player_id == player)
    }
}

/// How a turn ended
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEnd {
    Stood,
    RollsExhausted,
    TimedOut,
    /// Player left the game; the turn does not count
    Forfeited,
    /// Game ended under the player's feet
    Aborted,
}

/// Turn lifecycle
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "end", rename_all = "snake_case")]
pub enum TurnStatus {
    Active,
    Done(TurnEnd),
}

/// One player's roll sequence within a round
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub round_id: RoundId,
    pub player_id: AccountId,
    pub roll_count: u8,
    pub rolls: Vec<Vec<Die>>,
    /// Value of the latest roll
    pub value: Option<Score>,
    pub status: TurnStatus,
}

impl Turn {
    pub(crate) fn new(round_id: RoundId, player_id: AccountId) -> Self {
        Self {
            round_id,
            player_id,
            roll_count: 0,
            rolls: vec![],
            value: None,
            status: TurnStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TurnStatus::Active
    }

    pub fn last_roll(&self) -> Option<&[Die]> {
        self.rolls.last().map(Vec::as_slice)
    }

    /// Whether the turn takes part in winner selection
    pub fn counts(&self) -> bool {
        !matches!(
            self.status,
            TurnStatus::Active | TurnStatus::Done(TurnEnd::Forfeited)
        )
    }
}

/// Read-only game state for views
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game_id: GameId,
    pub status: GameStatus,
    pub players: Vec<AccountId>,
    pub round_number: u8,
    pub total_rounds: u8,
    pub active_player: Option<AccountId>,
    pub round_wins: BTreeMap<AccountId, u32>,
    pub current_round: Option<Round>,
    pub winners: Vec<AccountId>,
}
