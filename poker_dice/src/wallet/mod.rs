//! Credit management over an append-only ledger.
//!
//! - Every credit change is recorded as a ledger entry
//! - Idempotency keys prevent double application
//! - Balance checks and updates happen atomically in the repository
//! - Each applied change is announced as a `CreditUpdated` event
//!
//! ## Example
//!
//! ```no_run
//! use poker_dice::{clock::SystemClock, db::Repositories, events::EventChannel, wallet::WalletManager};
//! use std::{sync::Arc, time::Duration};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repos = Repositories::in_memory();
//! let wallet = WalletManager::new(
//!     repos.accounts.clone(),
//!     EventChannel::new(256),
//!     Arc::new(SystemClock),
//!     Duration::from_secs(5),
//! );
//!
//! let balance = wallet.deposit(1, 50, "deposit_unique_key".to_string()).await?;
//! println!("New balance: {balance}");
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{WalletError, WalletResult};
pub use manager::WalletManager;
pub use models::{CreditEntry, CreditOutcome, EntryDirection, EntryType, NewCreditEntry};
