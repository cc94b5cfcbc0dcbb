//! Lobby actor message types.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::{
    errors::LobbyResult,
    models::{LeaveOutcome, LobbyView},
};
use crate::{
    auth::AccountId,
    game::{Die, GameId, Score},
};

/// Messages that can be sent to a LobbyActor
#[derive(Debug)]
pub enum LobbyMessage {
    /// Join lobby request; answers with the new member count
    Join {
        account_id: AccountId,
        password: Option<String>,
        response: oneshot::Sender<LobbyResult<usize>>,
    },

    /// Leave lobby request
    Leave {
        account_id: AccountId,
        response: oneshot::Sender<LobbyResult<LeaveOutcome>>,
    },

    /// Host starts the game
    StartGame {
        requester: AccountId,
        response: oneshot::Sender<LobbyResult<GameId>>,
    },

    /// Roll the dice, keeping the given positions of the previous roll
    Roll {
        player: AccountId,
        keep: Vec<usize>,
        response: oneshot::Sender<LobbyResult<RollOutcome>>,
    },

    /// End the turn with the latest roll
    Stand {
        player: AccountId,
        response: oneshot::Sender<LobbyResult<()>>,
    },

    /// Get current lobby state
    GetView {
        response: oneshot::Sender<LobbyResult<LobbyView>>,
    },
}

/// Result of a successful roll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOutcome {
    pub dice: Vec<Die>,
    pub value: Score,
    pub roll_count: u8,
    /// The roll used up the turn's last roll
    pub turn_finished: bool,
}
