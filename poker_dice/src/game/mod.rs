//! Dice game engine.
//!
//! A game moves `Waiting → Running → Ended`; within a running game each
//! round moves `Open → Closed` and each turn `Active → Done`. The engine is
//! synchronous and storage-free; see [`GameMachine`].

pub mod dice;
pub mod errors;
pub mod models;
pub mod scoring;
pub mod state_machine;

pub use dice::{DiceRoller, Die, RandomDiceRoller, ScriptedDiceRoller};
pub use errors::{GameError, GameResult};
pub use models::{
    Game, GameEndReason, GameId, GameSnapshot, GameStatus, NewGame, Round, RoundId, RoundStatus,
    Turn, TurnEnd, TurnStatus,
};
pub use scoring::{Score, Scorer, best_players};
pub use state_machine::{ForfeitReason, GameMachine, GameTransition, split_pot};
