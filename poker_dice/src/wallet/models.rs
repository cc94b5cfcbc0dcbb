//! Credit ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{auth::AccountId, game::GameId};

/// Ledger entry recorded for every credit change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditEntry {
    pub id: i64,
    pub account_id: AccountId,
    pub game_id: Option<GameId>,
    /// Signed change applied to the balance
    pub amount: i64,
    pub balance_after: i64,
    pub direction: EntryDirection,
    pub entry_type: EntryType,
    pub idempotency_key: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Credit change as handed to storage
#[derive(Debug, Clone)]
pub struct NewCreditEntry {
    pub account_id: AccountId,
    pub game_id: Option<GameId>,
    pub amount: i64,
    pub entry_type: EntryType,
    pub idempotency_key: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewCreditEntry {
    pub fn direction(&self) -> EntryDirection {
        if self.amount < 0 {
            EntryDirection::Debit
        } else {
            EntryDirection::Credit
        }
    }
}

/// Result of an atomic credit change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// Change applied, balance after the change
    Applied { balance: i64 },
    /// Debit refused, the balance would go negative
    Insufficient { available: i64 },
    /// Idempotency key already used; nothing applied
    Duplicate,
    /// The balance would leave the `i64` range; nothing applied
    Overflow,
}

/// Entry direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryDirection {
    Debit,
    Credit,
}

impl std::fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryDirection::Debit => write!(f, "debit"),
            EntryDirection::Credit => write!(f, "credit"),
        }
    }
}

/// Entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Deposit,
    Ante,
    Payout,
    /// Ante returned when a round could not open
    Refund,
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryType::Deposit => write!(f, "deposit"),
            EntryType::Ante => write!(f, "ante"),
            EntryType::Payout => write!(f, "payout"),
            EntryType::Refund => write!(f, "refund"),
        }
    }
}
