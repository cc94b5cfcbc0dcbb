//! Server-push event channel.
//!
//! Domain events are published on a [`Topic`]; subscribers receive them as
//! [`EventEnvelope`]s in emission order and end with a typed
//! [`Termination`].

pub mod channel;
pub mod keep_alive;
pub mod models;

pub use channel::{ChannelError, ChannelResult, EventChannel, Subscription, Termination};
pub use keep_alive::spawn_keep_alive;
pub use models::{
    CreditUpdated, DomainEvent, EventEnvelope, EventKind, GameEnded, GameStarted, GameUpdate,
    GameUpdated, KeepAlive, LobbyCreated, LobbyDeleted, LobbyUpdated, PlayerJoined, PlayerLeft,
    RoundEnded, Topic,
};
