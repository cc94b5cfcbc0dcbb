//! Domain events and their envelopes.

use chrono::{DateTime, Utc};
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

use crate::{
    auth::AccountId,
    game::{
        Die, ForfeitReason, GameEndReason, GameId, GameTransition, RoundId, Score, TurnEnd,
    },
    lobby::{LobbyId, LobbySummary},
    wallet::EntryType,
};

/// Feed a subscriber listens to
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "id", rename_all = "snake_case")]
pub enum Topic {
    /// Lobby registry: lobbies appearing, changing and disappearing
    Lobbies,
    /// Membership and game progress of one lobby
    Lobby(LobbyId),
    /// Credit changes of one account
    Account(AccountId),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobbies => write!(f, "lobbies"),
            Self::Lobby(id) => write!(f, "lobby/{id}"),
            Self::Account(id) => write!(f, "account/{id}"),
        }
    }
}

/// Common behavior of every event payload
#[enum_dispatch]
pub trait EventKind {
    /// Stable name used by push transports
    fn kind(&self) -> &'static str;

    /// Topic the event is delivered to; `None` reaches every subscriber
    fn topic(&self) -> Option<Topic>;

    /// Counts towards a subscriber's unseen events
    fn is_notable(&self) -> bool {
        true
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LobbyCreated {
    pub lobby: LobbySummary,
}

impl EventKind for LobbyCreated {
    fn kind(&self) -> &'static str {
        "lobby_created"
    }

    fn topic(&self) -> Option<Topic> {
        Some(Topic::Lobbies)
    }
}

/// Membership, host or running state of a listed lobby changed
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LobbyUpdated {
    pub lobby: LobbySummary,
}

impl EventKind for LobbyUpdated {
    fn kind(&self) -> &'static str {
        "lobby_updated"
    }

    fn topic(&self) -> Option<Topic> {
        Some(Topic::Lobbies)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LobbyDeleted {
    pub lobby_id: LobbyId,
}

impl EventKind for LobbyDeleted {
    fn kind(&self) -> &'static str {
        "lobby_deleted"
    }

    fn topic(&self) -> Option<Topic> {
        Some(Topic::Lobbies)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PlayerJoined {
    pub lobby_id: LobbyId,
    pub account_id: AccountId,
    pub player_count: usize,
}

impl EventKind for PlayerJoined {
    fn kind(&self) -> &'static str {
        "player_joined"
    }

    fn topic(&self) -> Option<Topic> {
        Some(Topic::Lobby(self.lobby_id))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PlayerLeft {
    pub lobby_id: LobbyId,
    pub account_id: AccountId,
    pub player_count: usize,
    /// Set when the host left and the role moved on
    pub new_host: Option<AccountId>,
}

impl EventKind for PlayerLeft {
    fn kind(&self) -> &'static str {
        "player_left"
    }

    fn topic(&self) -> Option<Topic> {
        Some(Topic::Lobby(self.lobby_id))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GameStarted {
    pub lobby_id: LobbyId,
    pub game_id: GameId,
    pub players: Vec<AccountId>,
}

impl EventKind for GameStarted {
    fn kind(&self) -> &'static str {
        "game_started"
    }

    fn topic(&self) -> Option<Topic> {
        Some(Topic::Lobby(self.lobby_id))
    }
}

/// Progress within a running game
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameUpdate {
    RoundStarted {
        round_id: RoundId,
        number: u8,
        bet: i64,
        pot: i64,
        order: Vec<AccountId>,
    },
    DiceRolled {
        player: AccountId,
        roll_count: u8,
        kept: Vec<usize>,
        dice: Vec<Die>,
        value: Score,
    },
    TurnFinished {
        player: AccountId,
        end: TurnEnd,
        value: Option<Score>,
        next_player: Option<AccountId>,
    },
    PlayerForfeited {
        player: AccountId,
        reason: ForfeitReason,
    },
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GameUpdated {
    pub lobby_id: LobbyId,
    pub game_id: GameId,
    pub update: GameUpdate,
}

impl EventKind for GameUpdated {
    fn kind(&self) -> &'static str {
        "game_updated"
    }

    fn topic(&self) -> Option<Topic> {
        Some(Topic::Lobby(self.lobby_id))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RoundEnded {
    pub lobby_id: LobbyId,
    pub game_id: GameId,
    pub number: u8,
    pub winners: Vec<AccountId>,
    pub pot: i64,
    pub values: Vec<(AccountId, Option<Score>)>,
}

impl EventKind for RoundEnded {
    fn kind(&self) -> &'static str {
        "round_ended"
    }

    fn topic(&self) -> Option<Topic> {
        Some(Topic::Lobby(self.lobby_id))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GameEnded {
    pub lobby_id: LobbyId,
    pub game_id: GameId,
    pub winners: Vec<AccountId>,
    pub reason: GameEndReason,
    pub round_wins: BTreeMap<AccountId, u32>,
}

impl EventKind for GameEnded {
    fn kind(&self) -> &'static str {
        "game_ended"
    }

    fn topic(&self) -> Option<Topic> {
        Some(Topic::Lobby(self.lobby_id))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CreditUpdated {
    pub account_id: AccountId,
    pub balance: i64,
    /// Signed change
    pub change: i64,
    pub entry_type: EntryType,
}

impl EventKind for CreditUpdated {
    fn kind(&self) -> &'static str {
        "credit_updated"
    }

    fn topic(&self) -> Option<Topic> {
        Some(Topic::Account(self.account_id))
    }
}

/// Idle-time ping keeping long-lived subscriptions open
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeepAlive {
    pub at: DateTime<Utc>,
}

impl EventKind for KeepAlive {
    fn kind(&self) -> &'static str {
        "keep_alive"
    }

    fn topic(&self) -> Option<Topic> {
        None
    }

    fn is_notable(&self) -> bool {
        false
    }
}

/// Notification describing a state change
#[enum_dispatch(EventKind)]
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    LobbyCreated(LobbyCreated),
    LobbyUpdated(LobbyUpdated),
    LobbyDeleted(LobbyDeleted),
    PlayerJoined(PlayerJoined),
    PlayerLeft(PlayerLeft),
    GameStarted(GameStarted),
    GameUpdated(GameUpdated),
    RoundEnded(RoundEnded),
    GameEnded(GameEnded),
    CreditUpdated(CreditUpdated),
    KeepAlive(KeepAlive),
}

impl DomainEvent {
    /// The event announcing a game state transition
    pub fn from_transition(lobby_id: LobbyId, game_id: GameId, transition: GameTransition) -> Self {
        let update = match transition {
            GameTransition::Started { players, .. } => {
                return GameStarted {
                    lobby_id,
                    game_id,
                    players,
                }
                .into();
            }
            GameTransition::RoundClosed {
                number,
                winners,
                pot,
                values,
                ..
            } => {
                return RoundEnded {
                    lobby_id,
                    game_id,
                    number,
                    winners,
                    pot,
                    values,
                }
                .into();
            }
            GameTransition::Ended {
                winners,
                reason,
                round_wins,
            } => {
                return GameEnded {
                    lobby_id,
                    game_id,
                    winners,
                    reason,
                    round_wins,
                }
                .into();
            }
            GameTransition::RoundOpened {
                round_id,
                number,
                bet,
                pot,
                order,
            } => GameUpdate::RoundStarted {
                round_id,
                number,
                bet,
                pot,
                order,
            },
            GameTransition::DiceRolled {
                player,
                roll_count,
                kept,
                dice,
                value,
            } => GameUpdate::DiceRolled {
                player,
                roll_count,
                kept,
                dice,
                value,
            },
            GameTransition::TurnFinished {
                player,
                end,
                value,
                next_player,
            } => GameUpdate::TurnFinished {
                player,
                end,
                value,
                next_player,
            },
            GameTransition::PlayerForfeited { player, reason } => {
                GameUpdate::PlayerForfeited { player, reason }
            }
        };

        GameUpdated {
            lobby_id,
            game_id,
            update,
        }
        .into()
    }
}

/// Event as delivered to a subscriber
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Channel-wide emission order
    pub seq: u64,
    pub topic: Option<Topic>,
    pub event: DomainEvent,
}

impl EventEnvelope {
    pub fn kind(&self) -> &'static str {
        self.event.kind()
    }

    /// JSON rendering for text-based push transports
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics() {
        let joined: DomainEvent = PlayerJoined {
            lobby_id: 4,
            account_id: 1,
            player_count: 2,
        }
        .into();
        assert_eq!(joined.topic(), Some(Topic::Lobby(4)));
        assert_eq!(joined.kind(), "player_joined");

        let credit: DomainEvent = CreditUpdated {
            account_id: 9,
            balance: 150,
            change: 50,
            entry_type: EntryType::Deposit,
        }
        .into();
        assert_eq!(credit.topic(), Some(Topic::Account(9)));
    }

    #[test]
    fn test_keep_alive_is_broadcast_and_not_notable() {
        let event: DomainEvent = KeepAlive { at: Utc::now() }.into();
        assert_eq!(event.topic(), None);
        assert!(!event.is_notable());
    }

    #[test]
    fn test_transition_mapping() {
        let started = DomainEvent::from_transition(
            1,
            2,
            GameTransition::Started {
                game_id: 2,
                players: vec![5, 6],
            },
        );
        assert!(matches!(started, DomainEvent::GameStarted(ref e) if e.players == vec![5, 6]));

        let rolled = DomainEvent::from_transition(
            1,
            2,
            GameTransition::TurnFinished {
                player: 5,
                end: TurnEnd::Stood,
                value: None,
                next_player: Some(6),
            },
        );
        assert_eq!(rolled.kind(), "game_updated");
    }

    #[test]
    fn test_envelope_json() {
        let envelope = EventEnvelope {
            seq: 7,
            topic: Some(Topic::Lobbies),
            event: LobbyDeleted { lobby_id: 3 }.into(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

        assert_eq!(json["seq"], 7);
        assert_eq!(json["topic"]["topic"], "lobbies");
        assert_eq!(json["event"]["kind"], "lobby_deleted");
        assert_eq!(json["event"]["lobby_id"], 3);
    }
}
