//! Password policy and Argon2id hashing.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use std::sync::{Arc, OnceLock};

use super::errors::{AuthError, AuthResult};
use crate::config::PasswordRules;

/// Decides whether a password is safe enough to accept
pub trait PasswordPolicy: Send + Sync {
    /// `Err` carries a human readable reason
    fn check(&self, password: &str) -> Result<(), String>;
}

impl<F> PasswordPolicy for F
where
    F: Fn(&str) -> Result<(), String> + Send + Sync,
{
    fn check(&self, password: &str) -> Result<(), String> {
        self(password)
    }
}

/// Minimum length plus optional digit and uppercase requirements
#[derive(Debug, Clone)]
pub struct DefaultPasswordPolicy {
    rules: PasswordRules,
}

impl DefaultPasswordPolicy {
    pub fn new(rules: PasswordRules) -> Self {
        Self { rules }
    }
}

impl PasswordPolicy for DefaultPasswordPolicy {
    fn check(&self, password: &str) -> Result<(), String> {
        if password.chars().count() < self.rules.min_length {
            return Err(format!(
                "Password must be at least {} characters",
                self.rules.min_length
            ));
        }

        if self.rules.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err("Password must contain at least one number".to_string());
        }

        if self.rules.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err("Password must contain at least one uppercase letter".to_string());
        }

        Ok(())
    }
}

const SALT_BYTES: usize = 16;

/// Argon2id hashing with an optional server-side pepper
#[derive(Clone, Default)]
pub struct PepperedHasher {
    pepper: String,
    /// Hash checked when the account is unknown, built on first use
    decoy: Arc<OnceLock<String>>,
}

impl PepperedHasher {
    pub fn new(pepper: Option<String>) -> Self {
        Self {
            pepper: pepper.unwrap_or_default(),
            decoy: Arc::default(),
        }
    }

    /// Hash password with Argon2id + pepper
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let peppered = format!("{}{}", password, self.pepper);
        let salt_bytes: [u8; SALT_BYTES] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|_| AuthError::HashingFailed)?;

        Ok(Argon2::default()
            .hash_password(peppered.as_bytes(), &salt)
            .map_err(|_| AuthError::HashingFailed)?
            .to_string())
    }

    /// Verify password against hash; a malformed hash never verifies
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let peppered = format!("{}{}", password, self.pepper);
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(peppered.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Spend the same Argon2 work as `verify` for a login whose account does
    /// not exist. Always `false`.
    pub fn verify_unknown(&self, password: &str) -> bool {
        let decoy = self.decoy.get_or_init(|| {
            self.hash("decoy password for unknown accounts")
                .unwrap_or_default()
        });
        self.verify(password, decoy);
        false
    }

    #[cfg(test)]
    pub(crate) fn decoy_built(&self) -> bool {
        self.decoy.get().is_some()
    }
}
