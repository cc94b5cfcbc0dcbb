//! Account identity, credentials and session tokens.
//!
//! - Argon2id password hashing with an optional server-side pepper
//! - Pluggable password policy
//! - Opaque random session tokens; only their SHA-256 digest is stored
//! - Absolute and rolling token lifetimes checked against an injected clock
//!
//! ## Example
//!
//! ```no_run
//! use poker_dice::{
//!     auth::{AuthManager, RegisterRequest},
//!     clock::SystemClock,
//!     config::PokerDiceConfig,
//!     db::Repositories,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let auth = AuthManager::new(
//!     &Repositories::in_memory(),
//!     &PokerDiceConfig::default(),
//!     Arc::new(SystemClock),
//! );
//!
//! let account = auth
//!     .register(RegisterRequest {
//!         username: "player1".to_string(),
//!         display_name: "Player One".to_string(),
//!         age: 30,
//!         password: "SecurePass123".to_string(),
//!     })
//!     .await?;
//! let token = auth.authenticate("player1", "SecurePass123").await?;
//! assert_eq!(auth.validate_token(&token.token).await?, account.id);
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod manager;
pub mod models;
pub mod password;
pub mod token;

pub use errors::{AuthError, AuthResult};
pub use manager::AuthManager;
pub use models::{Account, AccountId, IssuedToken, NewAccount, RegisterRequest, SessionToken};
pub use password::{DefaultPasswordPolicy, PasswordPolicy, PepperedHasher};
