//! Lobby registry with one async actor per lobby.
//!
//! This module implements:
//! - LobbyActor: owns one lobby and, once started, its game
//! - LobbyManager: creates lobbies, spawns their actors and routes requests
//! - Message-based communication with tokio channels
//!
//! ## Architecture
//!
//! Each lobby runs in a separate Tokio task with an mpsc message inbox, so
//! all mutations of a lobby and its game are serialized while different
//! lobbies proceed in parallel. The actor also enforces the turn time
//! budget and removes itself once the lobby is deleted or its game ends.
//!
//! ## Example
//!
//! ```no_run
//! use poker_dice::lobby::{LobbyManager, LobbySettings};
//!
//! # async fn example(manager: LobbyManager) -> Result<(), Box<dyn std::error::Error>> {
//! let lobby_id = manager.create_lobby(1, LobbySettings::default()).await?;
//! manager.join(lobby_id, 2, None).await?;
//! let game_id = manager.start_game(lobby_id, 1).await?;
//! println!("Game {game_id} running");
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod errors;
pub mod manager;
pub mod messages;
pub mod models;

pub use actor::{LobbyActor, LobbyHandle, LobbyServices};
pub use errors::{LobbyError, LobbyResult};
pub use manager::LobbyManager;
pub use messages::{LobbyMessage, RollOutcome};
pub use models::{
    LeaveOutcome, Lobby, LobbyId, LobbySettings, LobbySummary, LobbyView, NewLobby,
};
