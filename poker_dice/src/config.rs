//! Runtime configuration.
//!
//! Consolidates all environment variable reads and provides validated
//! configuration for every manager in the crate.

use std::time::Duration;

/// Hard lower bound for lobby capacity.
pub const MIN_PLAYERS: usize = 2;

/// Hard upper bound for lobby capacity.
pub const MAX_PLAYERS: usize = 6;

/// Hard lower bound for the number of rounds in a game.
pub const MIN_ROUNDS: u8 = 2;

/// Hard upper bound for the number of rounds in a game.
pub const MAX_ROUNDS: u8 = 10;

/// Smallest minimum credit (and round bet) a lobby may ask for.
pub const MIN_LOBBY_CREDIT: i64 = 10;

/// Complete configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct PokerDiceConfig {
    /// Bounds every lobby's settings are validated against
    pub lobby: LobbyLimits,
    /// Session token lifetimes
    pub tokens: TokenPolicy,
    /// Password strength rules
    pub passwords: PasswordRules,
    /// Dice and turn rules
    pub game: GameRules,
    /// Event channel tuning
    pub events: EventSettings,
    /// Secrets
    pub security: SecuritySettings,
    /// Credit granted to a newly registered account
    pub starting_credit: i64,
    /// Upper bound for a single request to a lobby actor or repository
    pub request_timeout: Duration,
}

/// Bounds for lobby settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyLimits {
    pub min_players: usize,
    pub max_players: usize,
    pub min_rounds: u8,
    pub max_rounds: u8,
    pub min_credit: i64,
    /// Shortest turn time budget a lobby may configure
    pub min_turn_time: Duration,
    /// Longest turn time budget a lobby may configure
    pub max_turn_time: Duration,
}

/// Session token lifetimes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPolicy {
    /// Lifetime counted from creation, never extended
    pub absolute_ttl: chrono::Duration,
    /// Idle lifetime, extended by every successful validation
    pub rolling_ttl: chrono::Duration,
    /// Live tokens kept per account; the least recently used is evicted
    pub max_tokens_per_account: usize,
}

/// Password strength rules used by the default password policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordRules {
    pub min_length: usize,
    pub require_digit: bool,
    pub require_uppercase: bool,
}

/// Dice and turn rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRules {
    pub dice_per_roll: usize,
    pub max_rolls_per_turn: u8,
}

/// Event channel tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSettings {
    /// Idle time after which a keep-alive is pushed
    pub keep_alive_interval: Duration,
    /// Queued events per subscriber before it is dropped as lagging
    pub subscriber_capacity: usize,
}

/// Secrets
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecuritySettings {
    /// Server-side pepper appended to passwords before hashing
    pub password_pepper: Option<String>,
}

impl Default for LobbyLimits {
    fn default() -> Self {
        Self {
            min_players: MIN_PLAYERS,
            max_players: MAX_PLAYERS,
            min_rounds: MIN_ROUNDS,
            max_rounds: MAX_ROUNDS,
            min_credit: MIN_LOBBY_CREDIT,
            min_turn_time: Duration::from_secs(10),
            max_turn_time: Duration::from_secs(300),
        }
    }
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            absolute_ttl: chrono::Duration::hours(24),
            rolling_ttl: chrono::Duration::hours(1),
            max_tokens_per_account: 3,
        }
    }
}

impl Default for PasswordRules {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_digit: true,
            require_uppercase: true,
        }
    }
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            dice_per_roll: 5,
            max_rolls_per_turn: 3,
        }
    }
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            keep_alive_interval: Duration::from_secs(15),
            subscriber_capacity: 256,
        }
    }
}

impl Default for PokerDiceConfig {
    fn default() -> Self {
        Self {
            lobby: LobbyLimits::default(),
            tokens: TokenPolicy::default(),
            passwords: PasswordRules::default(),
            game: GameRules::default(),
            events: EventSettings::default(),
            security: SecuritySettings::default(),
            starting_credit: 100,
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl PokerDiceConfig {
    /// Load configuration from environment variables
    ///
    /// Every variable is optional and falls back to the development default:
    /// - `LOBBY_MIN_PLAYERS`, `LOBBY_MAX_PLAYERS`
    /// - `LOBBY_MIN_ROUNDS`, `LOBBY_MAX_ROUNDS`
    /// - `LOBBY_MIN_CREDIT`
    /// - `LOBBY_MIN_TURN_SECS`, `LOBBY_MAX_TURN_SECS`
    /// - `TOKEN_ABSOLUTE_TTL_SECS`, `TOKEN_ROLLING_TTL_SECS`, `TOKEN_MAX_PER_ACCOUNT`
    /// - `PASSWORD_MIN_LENGTH`, `PASSWORD_REQUIRE_DIGIT`, `PASSWORD_REQUIRE_UPPERCASE`
    /// - `PASSWORD_PEPPER`
    /// - `DICE_PER_ROLL`, `MAX_ROLLS_PER_TURN`
    /// - `EVENT_KEEP_ALIVE_SECS`, `EVENT_SUBSCRIBER_CAPACITY`
    /// - `STARTING_CREDIT`, `REQUEST_TIMEOUT_MS`
    ///
    /// # Errors
    ///
    /// Returns error if the loaded values fail [`PokerDiceConfig::validate`]
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let lobby = LobbyLimits {
            min_players: parse_env_or("LOBBY_MIN_PLAYERS", defaults.lobby.min_players),
            max_players: parse_env_or("LOBBY_MAX_PLAYERS", defaults.lobby.max_players),
            min_rounds: parse_env_or("LOBBY_MIN_ROUNDS", defaults.lobby.min_rounds),
            max_rounds: parse_env_or("LOBBY_MAX_ROUNDS", defaults.lobby.max_rounds),
            min_credit: parse_env_or("LOBBY_MIN_CREDIT", defaults.lobby.min_credit),
            min_turn_time: Duration::from_secs(parse_env_or(
                "LOBBY_MIN_TURN_SECS",
                defaults.lobby.min_turn_time.as_secs(),
            )),
            max_turn_time: Duration::from_secs(parse_env_or(
                "LOBBY_MAX_TURN_SECS",
                defaults.lobby.max_turn_time.as_secs(),
            )),
        };

        let tokens = TokenPolicy {
            absolute_ttl: chrono::Duration::seconds(parse_env_or(
                "TOKEN_ABSOLUTE_TTL_SECS",
                defaults.tokens.absolute_ttl.num_seconds(),
            )),
            rolling_ttl: chrono::Duration::seconds(parse_env_or(
                "TOKEN_ROLLING_TTL_SECS",
                defaults.tokens.rolling_ttl.num_seconds(),
            )),
            max_tokens_per_account: parse_env_or(
                "TOKEN_MAX_PER_ACCOUNT",
                defaults.tokens.max_tokens_per_account,
            ),
        };

        let passwords = PasswordRules {
            min_length: parse_env_or("PASSWORD_MIN_LENGTH", defaults.passwords.min_length),
            require_digit: parse_env_or(
                "PASSWORD_REQUIRE_DIGIT",
                defaults.passwords.require_digit,
            ),
            require_uppercase: parse_env_or(
                "PASSWORD_REQUIRE_UPPERCASE",
                defaults.passwords.require_uppercase,
            ),
        };

        let game = GameRules {
            dice_per_roll: parse_env_or("DICE_PER_ROLL", defaults.game.dice_per_roll),
            max_rolls_per_turn: parse_env_or(
                "MAX_ROLLS_PER_TURN",
                defaults.game.max_rolls_per_turn,
            ),
        };

        let events = EventSettings {
            keep_alive_interval: Duration::from_secs(parse_env_or(
                "EVENT_KEEP_ALIVE_SECS",
                defaults.events.keep_alive_interval.as_secs(),
            )),
            subscriber_capacity: parse_env_or(
                "EVENT_SUBSCRIBER_CAPACITY",
                defaults.events.subscriber_capacity,
            ),
        };

        let security = SecuritySettings {
            password_pepper: std::env::var("PASSWORD_PEPPER").ok(),
        };

        let config = Self {
            lobby,
            tokens,
            passwords,
            game,
            events,
            security,
            starting_credit: parse_env_or("STARTING_CREDIT", defaults.starting_credit),
            request_timeout: Duration::from_millis(parse_env_or(
                "REQUEST_TIMEOUT_MS",
                defaults.request_timeout.as_millis() as u64,
            )),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lobby = &self.lobby;

        if lobby.min_players < MIN_PLAYERS || lobby.min_players > lobby.max_players {
            return Err(ConfigError::Invalid {
                var: "LOBBY_MIN_PLAYERS".to_string(),
                reason: format!(
                    "Must be between {MIN_PLAYERS} and max players ({})",
                    lobby.max_players
                ),
            });
        }

        if lobby.max_players > MAX_PLAYERS {
            return Err(ConfigError::Invalid {
                var: "LOBBY_MAX_PLAYERS".to_string(),
                reason: format!("Must be at most {MAX_PLAYERS}"),
            });
        }

        if lobby.min_rounds < MIN_ROUNDS || lobby.min_rounds >= lobby.max_rounds {
            return Err(ConfigError::Invalid {
                var: "LOBBY_MIN_ROUNDS".to_string(),
                reason: format!(
                    "Must be at least {MIN_ROUNDS} and below max rounds ({})",
                    lobby.max_rounds
                ),
            });
        }

        if lobby.max_rounds > MAX_ROUNDS {
            return Err(ConfigError::Invalid {
                var: "LOBBY_MAX_ROUNDS".to_string(),
                reason: format!("Must be at most {MAX_ROUNDS}"),
            });
        }

        if lobby.min_credit < MIN_LOBBY_CREDIT {
            return Err(ConfigError::Invalid {
                var: "LOBBY_MIN_CREDIT".to_string(),
                reason: format!("Must be at least {MIN_LOBBY_CREDIT}"),
            });
        }

        if lobby.min_turn_time.is_zero() || lobby.min_turn_time > lobby.max_turn_time {
            return Err(ConfigError::Invalid {
                var: "LOBBY_MIN_TURN_SECS".to_string(),
                reason: "Must be positive and not above the max turn time".to_string(),
            });
        }

        if self.tokens.rolling_ttl <= chrono::Duration::zero()
            || self.tokens.rolling_ttl > self.tokens.absolute_ttl
        {
            return Err(ConfigError::Invalid {
                var: "TOKEN_ROLLING_TTL_SECS".to_string(),
                reason: "Must be positive and not above the absolute TTL".to_string(),
            });
        }

        if self.tokens.max_tokens_per_account == 0 {
            return Err(ConfigError::Invalid {
                var: "TOKEN_MAX_PER_ACCOUNT".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if self.passwords.min_length < 4 {
            return Err(ConfigError::Invalid {
                var: "PASSWORD_MIN_LENGTH".to_string(),
                reason: "Must be at least 4".to_string(),
            });
        }

        if let Some(pepper) = &self.security.password_pepper
            && pepper.len() < 16
        {
            return Err(ConfigError::Invalid {
                var: "PASSWORD_PEPPER".to_string(),
                reason: "Must be at least 16 characters (64-bit security)".to_string(),
            });
        }

        if self.game.dice_per_roll == 0 {
            return Err(ConfigError::Invalid {
                var: "DICE_PER_ROLL".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if self.game.max_rolls_per_turn == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_ROLLS_PER_TURN".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if self.events.keep_alive_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "EVENT_KEEP_ALIVE_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.events.subscriber_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "EVENT_SUBSCRIBER_CAPACITY".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.starting_credit < 0 {
            return Err(ConfigError::Invalid {
                var: "STARTING_CREDIT".to_string(),
                reason: "Must not be negative".to_string(),
            });
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "REQUEST_TIMEOUT_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config_is_valid() {
        PokerDiceConfig::default()
            .validate()
            .expect("defaults should validate");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            var: "PASSWORD_PEPPER".to_string(),
            reason: "Must be at least 16 characters".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("PASSWORD_PEPPER"));
        assert!(msg.contains("16 characters"));
    }

    #[test]
    fn test_max_players_above_hard_cap_rejected() {
        let mut config = PokerDiceConfig::default();
        config.lobby.max_players = 7;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "LOBBY_MAX_PLAYERS"));
    }

    #[test]
    fn test_min_rounds_must_stay_below_max_rounds() {
        let mut config = PokerDiceConfig::default();
        config.lobby.min_rounds = 10;
        config.lobby.max_rounds = 10;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rolling_ttl_cannot_exceed_absolute_ttl() {
        let mut config = PokerDiceConfig::default();
        config.tokens.rolling_ttl = chrono::Duration::hours(48);

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "TOKEN_ROLLING_TTL_SECS"));
    }

    #[test]
    fn test_short_pepper_rejected() {
        let mut config = PokerDiceConfig::default();
        config.security.password_pepper = Some("short".to_string());

        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_overrides() {
        // SAFETY: serialized with every other test touching the environment
        unsafe {
            std::env::set_var("LOBBY_MAX_PLAYERS", "4");
            std::env::set_var("MAX_ROLLS_PER_TURN", "2");
            std::env::set_var("TOKEN_ROLLING_TTL_SECS", "600");
        }

        let config = PokerDiceConfig::from_env().expect("config should load");

        unsafe {
            std::env::remove_var("LOBBY_MAX_PLAYERS");
            std::env::remove_var("MAX_ROLLS_PER_TURN");
            std::env::remove_var("TOKEN_ROLLING_TTL_SECS");
        }

        assert_eq!(config.lobby.max_players, 4);
        assert_eq!(config.game.max_rolls_per_turn, 2);
        assert_eq!(config.tokens.rolling_ttl, chrono::Duration::seconds(600));
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_invalid_values() {
        unsafe {
            std::env::set_var("LOBBY_MAX_PLAYERS", "9");
        }

        let result = PokerDiceConfig::from_env();

        unsafe {
            std::env::remove_var("LOBBY_MAX_PLAYERS");
        }

        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_unparsable_values() {
        unsafe {
            std::env::set_var("STARTING_CREDIT", "lots");
        }

        let config = PokerDiceConfig::from_env().expect("config should load");

        unsafe {
            std::env::remove_var("STARTING_CREDIT");
        }

        assert_eq!(config.starting_credit, 100);
    }
}
