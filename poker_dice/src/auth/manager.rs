//! Authentication manager implementation.

use log::{debug, info};
use std::{sync::Arc, time::Duration};

use super::{
    errors::{AuthError, AuthResult},
    models::{Account, AccountId, IssuedToken, NewAccount, RegisterRequest, SessionToken},
    password::{DefaultPasswordPolicy, PasswordPolicy, PepperedHasher},
    token::{generate_token, is_well_formed, token_digest},
};
use crate::{
    clock::Clock,
    config::{PokerDiceConfig, TokenPolicy},
    db::{AccountRepository, Repositories, RepositoryError, SessionRepository, with_timeout},
};

const MIN_AGE: u8 = 18;
const MAX_AGE: u8 = 100;

/// Authentication manager
#[derive(Clone)]
pub struct AuthManager {
    accounts: Arc<dyn AccountRepository>,
    sessions: Arc<dyn SessionRepository>,
    hasher: PepperedHasher,
    policy: Arc<dyn PasswordPolicy>,
    tokens: TokenPolicy,
    starting_credit: i64,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl AuthManager {
    /// Create a new authentication manager using the default password policy
    pub fn new(repos: &Repositories, config: &PokerDiceConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: Arc::clone(&repos.accounts),
            sessions: Arc::clone(&repos.sessions),
            hasher: PepperedHasher::new(config.security.password_pepper.clone()),
            policy: Arc::new(DefaultPasswordPolicy::new(config.passwords.clone())),
            tokens: config.tokens.clone(),
            starting_credit: config.starting_credit,
            clock,
            timeout: config.request_timeout,
        }
    }

    /// Replace the password policy
    pub fn with_password_policy(mut self, policy: Arc<dyn PasswordPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Hasher shared with lobby password checks
    pub fn hasher(&self) -> &PepperedHasher {
        &self.hasher
    }

    /// Register a new account
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidProfile` - Username, display name or age invalid
    /// * `AuthError::UnsafePassword` - Password rejected by the policy
    /// * `AuthError::UsernameTaken` - Username already exists
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<Account> {
        validate_username(&request.username)?;
        validate_profile(&request.display_name, request.age)?;
        self.policy
            .check(&request.password)
            .map_err(AuthError::UnsafePassword)?;

        let existing = with_timeout(
            self.timeout,
            self.accounts.find_by_username(&request.username),
        )
        .await?;
        if existing.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let password_hash = self.hasher.hash(&request.password)?;
        let new_account = NewAccount {
            username: request.username,
            password_hash,
            display_name: request.display_name.trim().to_string(),
            age: request.age,
            credit: self.starting_credit,
            created_at: self.clock.now(),
        };

        let account = match with_timeout(self.timeout, self.accounts.create_account(new_account))
            .await
        {
            Ok(account) => account,
            // lost a race with a concurrent registration
            Err(RepositoryError::Conflict(_)) => return Err(AuthError::UsernameTaken),
            Err(e) => return Err(e.into()),
        };

        info!("Registered account {} ({})", account.id, account.username);
        Ok(account)
    }

    /// Check credentials and issue a session token
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidCredentials` - Unknown username or wrong password
    pub async fn authenticate(&self, username: &str, password: &str) -> AuthResult<IssuedToken> {
        let Some(account) =
            with_timeout(self.timeout, self.accounts.find_by_username(username)).await?
        else {
            self.hasher.verify_unknown(password);
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &account.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let token = generate_token();
        let now = self.clock.now();
        let session = SessionToken {
            digest: token_digest(&token),
            account_id: account.id,
            created_at: now,
            last_used_at: now,
        };

        let evicted = with_timeout(
            self.timeout,
            self.sessions
                .create_session(session, self.tokens.max_tokens_per_account),
        )
        .await?;
        if !evicted.is_empty() {
            info!(
                "Evicted {} least recently used session(s) of account {}",
                evicted.len(),
                account.id
            );
        }

        Ok(IssuedToken {
            token,
            account_id: account.id,
            created_at: now,
            expires_at: now + self.tokens.absolute_ttl,
        })
    }

    /// Validate a token and slide its rolling window
    ///
    /// # Errors
    ///
    /// * `AuthError::TokenInvalid` - Token unknown or malformed
    /// * `AuthError::TokenExpired` - Absolute or rolling lifetime exceeded
    pub async fn validate_token(&self, token: &str) -> AuthResult<AccountId> {
        if !is_well_formed(token) {
            return Err(AuthError::TokenInvalid);
        }

        let digest = token_digest(token);
        let session = with_timeout(self.timeout, self.sessions.find_by_digest(&digest))
            .await?
            .ok_or(AuthError::TokenInvalid)?;

        let now = self.clock.now();
        if session.created_at > now {
            return Err(AuthError::TokenInvalid);
        }

        if now - session.created_at > self.tokens.absolute_ttl
            || now - session.last_used_at > self.tokens.rolling_ttl
        {
            debug!("Session of account {} expired", session.account_id);
            with_timeout(self.timeout, self.sessions.delete(&digest)).await?;
            return Err(AuthError::TokenExpired);
        }

        match with_timeout(self.timeout, self.sessions.touch(&digest, now)).await {
            Ok(session) => Ok(session.account_id),
            // revoked concurrently
            Err(RepositoryError::NotFound { .. }) => Err(AuthError::TokenInvalid),
            Err(e) => Err(e.into()),
        }
    }

    /// Revoke a token (logout)
    pub async fn revoke(&self, token: &str) -> AuthResult<()> {
        let removed = with_timeout(self.timeout, self.sessions.delete(&token_digest(token))).await?;
        if removed {
            Ok(())
        } else {
            Err(AuthError::TokenInvalid)
        }
    }

    /// Public profile of an account
    pub async fn account(&self, account_id: AccountId) -> AuthResult<Account> {
        with_timeout(self.timeout, self.accounts.find_by_id(account_id))
            .await?
            .ok_or(AuthError::AccountNotFound)
    }
}

/// Validate username format
fn validate_username(username: &str) -> AuthResult<()> {
    let len = username.chars().count();
    if !(3..=20).contains(&len) {
        return Err(AuthError::InvalidProfile(
            "Username must be 3-20 characters".to_string(),
        ));
    }

    if !username.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(AuthError::InvalidProfile(
            "Username can only contain letters, numbers, and underscores".to_string(),
        ));
    }

    Ok(())
}

fn validate_profile(display_name: &str, age: u8) -> AuthResult<()> {
    if display_name.trim().is_empty() {
        return Err(AuthError::InvalidProfile(
            "Display name must not be blank".to_string(),
        ));
    }

    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        return Err(AuthError::InvalidProfile(format!(
            "Age must be between {MIN_AGE} and {MAX_AGE}"
        )));
    }

    Ok(())
}
