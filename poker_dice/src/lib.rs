//! # PokerDice
//!
//! Core of a multiplayer poker dice game played over lobbies.
//!
//! Players register and authenticate with opaque session tokens, gather in
//! lobbies, and play a fixed number of rounds in which each player rolls
//! dice in turn. Every state change is pushed to subscribers as a typed
//! domain event.
//!
//! ## Architecture
//!
//! - Each lobby is driven by its own actor task; the actor owns the lobby's
//!   [`game::GameMachine`] and enforces the turn time budget
//! - The game engine is synchronous and storage-free; scoring and dice are
//!   pluggable through [`game::Scorer`] and [`game::DiceRoller`]
//! - Storage sits behind async repository traits in [`db`], with in-memory
//!   implementations included
//! - Credits move through an append-only ledger with idempotency keys
//!
//! ## Core Modules
//!
//! - [`auth`]: Accounts, password hashing and session tokens
//! - [`lobby`]: Lobby registry and per-lobby actors
//! - [`game`]: Game / round / turn state machine
//! - [`events`]: Topic-based event channel
//! - [`wallet`]: Deposits, antes and payouts
//! - [`service`]: The [`PokerDice`] facade
//!
//! ## Example
//!
//! ```no_run
//! use poker_dice::{PokerDice, PokerDiceConfig, auth::RegisterRequest, game::{Die, Score}};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), poker_dice::PokerDiceError> {
//! let scorer = Arc::new(|dice: &[Die]| Score(dice.iter().map(|d| u64::from(d.face())).sum()));
//! let poker_dice = PokerDice::new(PokerDiceConfig::default(), scorer);
//!
//! poker_dice
//!     .register(RegisterRequest {
//!         username: "alice".to_string(),
//!         display_name: "Alice".to_string(),
//!         age: 30,
//!         password: "SecurePass123".to_string(),
//!     })
//!     .await?;
//! let token = poker_dice.authenticate("alice", "SecurePass123").await?;
//! let lobbies = poker_dice.list_open_lobbies().await?;
//! println!("{} open lobbies for {}", lobbies.len(), token.account_id);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod events;
pub mod game;
pub mod lobby;
pub mod service;
pub mod wallet;

pub use config::PokerDiceConfig;
pub use service::{PokerDice, PokerDiceError, PokerDiceResult};
