//! Game error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by game actions. A failed action never changes state.
#[derive(Debug, Clone, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    #[error("not your turn")]
    NotYourTurn,
    #[error("turn already finished")]
    TurnAlreadyFinished,
    #[error("game is not running")]
    NotRunning,
    #[error("game already started")]
    AlreadyStarted,
    #[error("not a player in this game")]
    NotAPlayer,
    #[error("no round in progress")]
    NoOpenRound,
    #[error("round already in progress")]
    RoundInProgress,
    #[error("invalid hold: {0}")]
    InvalidHold(String),
    #[error("pot of {players} bets of {bet} exceeds the credit range")]
    PotOverflow { bet: i64, players: usize },
}

/// Result type for game operations
pub type GameResult<T> = Result<T, GameError>;
