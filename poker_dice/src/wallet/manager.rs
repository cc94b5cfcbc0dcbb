//! Wallet manager: deposits, antes and payouts over the credit ledger.

use log::{debug, warn};
use std::{sync::Arc, time::Duration};

use super::{
    errors::{WalletError, WalletResult},
    models::{CreditEntry, CreditOutcome, EntryType, NewCreditEntry},
};
use crate::{
    auth::AccountId,
    clock::Clock,
    db::{AccountRepository, RepositoryError, with_timeout},
    events::{CreditUpdated, EventChannel},
    game::GameId,
};

/// Wallet manager
#[derive(Clone)]
pub struct WalletManager {
    accounts: Arc<dyn AccountRepository>,
    events: EventChannel,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl WalletManager {
    /// Create a new wallet manager
    ///
    /// # Arguments
    ///
    /// * `accounts` - Account repository holding balances and the ledger
    /// * `events` - Channel receiving `CreditUpdated` events
    /// * `clock` - Time source for ledger timestamps
    /// * `timeout` - Upper bound for each repository call
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        events: EventChannel,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            accounts,
            events,
            clock,
            timeout,
        }
    }

    /// Current credit of an account
    pub async fn balance(&self, account_id: AccountId) -> WalletResult<i64> {
        with_timeout(self.timeout, self.accounts.find_by_id(account_id))
            .await?
            .map(|account| account.credit)
            .ok_or(WalletError::AccountNotFound(account_id))
    }

    /// Ledger entries of an account, oldest first
    pub async fn entries(&self, account_id: AccountId) -> WalletResult<Vec<CreditEntry>> {
        Ok(with_timeout(self.timeout, self.accounts.entries(account_id)).await?)
    }

    /// Add credit to an account
    ///
    /// # Arguments
    ///
    /// * `account_id` - Account to credit
    /// * `amount` - Positive amount
    /// * `idempotency_key` - Key unique among the account's deposits;
    ///   replaying it applies nothing. Stored as `deposit_{key}`, so it never
    ///   matches the key of an ante, payout or refund.
    ///
    /// # Returns
    ///
    /// * `WalletResult<i64>` - New balance
    ///
    /// # Errors
    ///
    /// * `WalletError::InvalidAmount` - Amount is zero or negative, or the
    ///   balance would overflow
    /// * `WalletError::DuplicateTransaction` - Idempotency key already used
    pub async fn deposit(
        &self,
        account_id: AccountId,
        amount: i64,
        idempotency_key: String,
    ) -> WalletResult<i64> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        let result = self
            .apply(NewCreditEntry {
                account_id,
                game_id: None,
                amount,
                entry_type: EntryType::Deposit,
                idempotency_key: format!("{}_{idempotency_key}", EntryType::Deposit),
                description: Some("Deposit".to_string()),
                created_at: self.clock.now(),
            })
            .await;

        match result {
            Err(WalletError::DuplicateTransaction(_)) => {
                Err(WalletError::DuplicateTransaction(idempotency_key))
            }
            other => other,
        }
    }

    /// Take the round bet from a player
    ///
    /// # Errors
    ///
    /// * `WalletError::InsufficientCredit` - Player cannot cover the bet
    pub async fn pay_ante(
        &self,
        account_id: AccountId,
        game_id: GameId,
        round_number: u8,
        amount: i64,
    ) -> WalletResult<i64> {
        self.game_entry(
            account_id,
            game_id,
            round_number,
            -amount,
            EntryType::Ante,
            format!("Ante for round {round_number} of game {game_id}"),
        )
        .await
    }

    /// Pay a round winner their share of the pot
    pub async fn payout(
        &self,
        account_id: AccountId,
        game_id: GameId,
        round_number: u8,
        amount: i64,
    ) -> WalletResult<i64> {
        self.game_entry(
            account_id,
            game_id,
            round_number,
            amount,
            EntryType::Payout,
            format!("Payout for round {round_number} of game {game_id}"),
        )
        .await
    }

    /// Return an ante of a round that never opened
    pub async fn refund(
        &self,
        account_id: AccountId,
        game_id: GameId,
        round_number: u8,
        amount: i64,
    ) -> WalletResult<i64> {
        self.game_entry(
            account_id,
            game_id,
            round_number,
            amount,
            EntryType::Refund,
            format!("Refund for round {round_number} of game {game_id}"),
        )
        .await
    }

    async fn game_entry(
        &self,
        account_id: AccountId,
        game_id: GameId,
        round_number: u8,
        amount: i64,
        entry_type: EntryType,
        description: String,
    ) -> WalletResult<i64> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        self.apply(NewCreditEntry {
            account_id,
            game_id: Some(game_id),
            amount,
            entry_type,
            idempotency_key: format!("{entry_type}_{game_id}_{round_number}_{account_id}"),
            description: Some(description),
            created_at: self.clock.now(),
        })
        .await
    }

    /// Apply an entry atomically and announce the new balance
    async fn apply(&self, entry: NewCreditEntry) -> WalletResult<i64> {
        let account_id = entry.account_id;
        let amount = entry.amount;
        let entry_type = entry.entry_type;
        let key = entry.idempotency_key.clone();

        let outcome = match with_timeout(self.timeout, self.accounts.apply_credit(entry)).await {
            Ok(outcome) => outcome,
            Err(RepositoryError::NotFound { .. }) => {
                return Err(WalletError::AccountNotFound(account_id));
            }
            Err(e) => return Err(e.into()),
        };

        match outcome {
            CreditOutcome::Applied { balance } => {
                debug!("{entry_type} of {amount} on account {account_id}, balance {balance}");
                let event = CreditUpdated {
                    account_id,
                    balance,
                    change: amount,
                    entry_type,
                };
                if let Err(e) = self.events.emit(event) {
                    warn!("Credit update of account {account_id} not announced: {e}");
                }
                Ok(balance)
            }
            CreditOutcome::Insufficient { available } => Err(WalletError::InsufficientCredit {
                available,
                required: -amount,
            }),
            CreditOutcome::Duplicate => Err(WalletError::DuplicateTransaction(key)),
            CreditOutcome::Overflow => {
                warn!("{entry_type} of {amount} on account {account_id} would overflow");
                Err(WalletError::InvalidAmount(amount))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::NewAccount,
        clock::SystemClock,
        db::InMemoryAccountRepository,
        events::Topic,
    };
    use chrono::Utc;

    async fn setup(credit: i64) -> (WalletManager, AccountId, EventChannel) {
        let accounts = Arc::new(InMemoryAccountRepository::new());
        let account = accounts
            .create_account(NewAccount {
                username: "alice".to_string(),
                password_hash: "hash".to_string(),
                display_name: "Alice".to_string(),
                age: 30,
                credit,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let events = EventChannel::new(16);
        let wallet = WalletManager::new(
            accounts,
            events.clone(),
            Arc::new(SystemClock),
            Duration::from_secs(5),
        );
        (wallet, account.id, events)
    }

    #[tokio::test]
    async fn test_deposit_applies_exactly_once() {
        let (wallet, id, _) = setup(100).await;

        assert_eq!(wallet.deposit(id, 50, "dep-1".to_string()).await.unwrap(), 150);
        assert!(matches!(
            wallet.deposit(id, 50, "dep-1".to_string()).await,
            Err(WalletError::DuplicateTransaction(_))
        ));
        assert_eq!(wallet.balance(id).await.unwrap(), 150);
    }

    #[tokio::test]
    async fn test_non_positive_deposit_rejected() {
        let (wallet, id, _) = setup(100).await;

        for amount in [0, -5] {
            assert!(matches!(
                wallet.deposit(id, amount, format!("dep{amount}")).await,
                Err(WalletError::InvalidAmount(_))
            ));
        }
        assert_eq!(wallet.balance(id).await.unwrap(), 100);
        assert!(wallet.entries(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deposit_key_cannot_claim_game_entry() {
        let (wallet, id, _) = setup(100).await;

        wallet
            .deposit(id, 1, format!("payout_1_1_{id}"))
            .await
            .unwrap();

        assert_eq!(wallet.payout(id, 1, 1, 20).await.unwrap(), 121);
        let keys: Vec<String> = wallet
            .entries(id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.idempotency_key)
            .collect();
        assert_eq!(keys, vec![format!("deposit_payout_1_1_{id}"), format!("payout_1_1_{id}")]);
    }

    #[tokio::test]
    async fn test_overflowing_deposit_rejected() {
        let (wallet, id, _) = setup(100).await;
        assert!(matches!(
            wallet.deposit(id, i64::MAX, "big".to_string()).await,
            Err(WalletError::InvalidAmount(i64::MAX))
        ));
        assert_eq!(wallet.balance(id).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_deposit_unknown_account() {
        let (wallet, _, _) = setup(100).await;
        assert!(matches!(
            wallet.deposit(42, 10, "dep".to_string()).await,
            Err(WalletError::AccountNotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_ante_and_payout() {
        let (wallet, id, _) = setup(100).await;

        assert_eq!(wallet.pay_ante(id, 1, 1, 30).await.unwrap(), 70);
        assert_eq!(wallet.payout(id, 1, 1, 60).await.unwrap(), 130);

        let entries = wallet.entries(id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry_type, EntryType::Ante);
        assert_eq!(entries[0].amount, -30);
        assert_eq!(entries[1].balance_after, 130);
    }

    #[tokio::test]
    async fn test_ante_is_taken_once_per_round() {
        let (wallet, id, _) = setup(100).await;
        wallet.pay_ante(id, 1, 1, 10).await.unwrap();
        assert!(matches!(
            wallet.pay_ante(id, 1, 1, 10).await,
            Err(WalletError::DuplicateTransaction(_))
        ));
        assert_eq!(wallet.pay_ante(id, 1, 2, 10).await.unwrap(), 80);
    }

    #[tokio::test]
    async fn test_ante_insufficient_credit() {
        let (wallet, id, _) = setup(5).await;
        assert!(matches!(
            wallet.pay_ante(id, 1, 1, 10).await,
            Err(WalletError::InsufficientCredit {
                available: 5,
                required: 10
            })
        ));
    }

    #[tokio::test]
    async fn test_credit_change_is_announced() {
        let (wallet, id, events) = setup(100).await;
        let mut feed = events.subscribe(Topic::Account(id)).unwrap();

        wallet.deposit(id, 25, "dep".to_string()).await.unwrap();

        let envelope = feed.recv().await.unwrap();
        assert_eq!(envelope.kind(), "credit_updated");
        assert!(matches!(
            envelope.event,
            crate::events::DomainEvent::CreditUpdated(CreditUpdated { balance: 125, change: 25, .. })
        ));
    }

    #[tokio::test]
    async fn test_closed_channel_does_not_block_credit() {
        let (wallet, id, events) = setup(100).await;
        events.complete();
        assert_eq!(wallet.deposit(id, 25, "dep".to_string()).await.unwrap(), 125);
    }

    #[test]
    fn test_client_message() {
        assert_eq!(
            WalletError::AccountNotFound(7).client_message(),
            "Account not found"
        );
    }
}
