//! Integration tests for deposits and game credit movements.

mod common;

use common::{player, scripted, settings, setup, setup_with};
use poker_dice::{
    PokerDiceConfig, PokerDiceError,
    lobby::{LeaveOutcome, LobbySettings},
    wallet::{EntryDirection, EntryType, WalletError},
};
use std::sync::Arc;
use tokio::task::JoinSet;

#[tokio::test]
async fn test_non_positive_deposit_changes_nothing() {
    let poker_dice = setup();
    let alice = player(&poker_dice, "alice").await;

    for amount in [0, -5] {
        let result = poker_dice.deposit(&alice.token, amount, None).await;
        assert!(matches!(
            result,
            Err(PokerDiceError::Wallet(WalletError::InvalidAmount(a))) if a == amount
        ));
    }

    assert_eq!(poker_dice.account(&alice.token).await.unwrap().credit, 100);
    assert!(poker_dice.wallet().entries(alice.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deposit_is_recorded() {
    let poker_dice = setup();
    let alice = player(&poker_dice, "alice").await;

    let balance = poker_dice
        .deposit(&alice.token, 50, Some("topup-1".to_string()))
        .await
        .unwrap();
    assert_eq!(balance, 150);
    assert_eq!(poker_dice.account(&alice.token).await.unwrap().credit, 150);

    let entries = poker_dice.wallet().entries(alice.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.amount, 50);
    assert_eq!(entry.balance_after, 150);
    assert_eq!(entry.direction, EntryDirection::Credit);
    assert_eq!(entry.entry_type, EntryType::Deposit);
    assert_eq!(entry.idempotency_key, "deposit_topup-1");
    assert_eq!(entry.game_id, None);
}

#[tokio::test]
async fn test_replayed_deposit_key_applies_once() {
    let poker_dice = setup();
    let alice = player(&poker_dice, "alice").await;
    let key = Some("topup-1".to_string());

    poker_dice.deposit(&alice.token, 50, key.clone()).await.unwrap();
    let replay = poker_dice.deposit(&alice.token, 50, key).await;

    assert!(matches!(
        replay,
        Err(PokerDiceError::Wallet(WalletError::DuplicateTransaction(ref k))) if k == "topup-1"
    ));
    assert_eq!(poker_dice.wallet().balance(alice.id).await.unwrap(), 150);
}

#[tokio::test]
async fn test_deposits_without_key_all_apply() {
    let poker_dice = setup();
    let alice = player(&poker_dice, "alice").await;

    poker_dice.deposit(&alice.token, 25, None).await.unwrap();
    let balance = poker_dice.deposit(&alice.token, 25, None).await.unwrap();

    assert_eq!(balance, 150);
    let entries = poker_dice.wallet().entries(alice.id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_ne!(entries[0].idempotency_key, entries[1].idempotency_key);
}

#[tokio::test]
async fn test_concurrent_replays_apply_once() {
    let poker_dice = Arc::new(setup());
    let alice = player(&poker_dice, "alice").await;

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let poker_dice = Arc::clone(&poker_dice);
        let token = alice.token.clone();
        tasks.spawn(async move {
            poker_dice
                .deposit(&token, 10, Some("same-key".to_string()))
                .await
        });
    }

    let mut applied = 0;
    let mut duplicates = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => applied += 1,
            Err(PokerDiceError::Wallet(WalletError::DuplicateTransaction(_))) => duplicates += 1,
            Err(e) => panic!("unexpected error {e}"),
        }
    }

    assert_eq!((applied, duplicates), (1, 7));
    assert_eq!(poker_dice.wallet().balance(alice.id).await.unwrap(), 110);
}

#[tokio::test]
async fn test_round_moves_credit_through_the_ledger() {
    let poker_dice = setup_with(
        PokerDiceConfig::default(),
        scripted(&[6, 6, 6, 6, 6, 1, 1, 1, 1, 1]),
    );
    let host = player(&poker_dice, "host").await;
    let guest = player(&poker_dice, "guest").await;
    let lobby_id = poker_dice
        .create_lobby(&host.token, settings(2, 2))
        .await
        .unwrap();
    poker_dice.join(&guest.token, lobby_id, None).await.unwrap();
    let game_id = poker_dice.start_game(&host.token, lobby_id).await.unwrap();

    for seated in [&host, &guest] {
        poker_dice
            .roll_dice(&seated.token, lobby_id, vec![])
            .await
            .unwrap();
        poker_dice.stand_turn(&seated.token, lobby_id).await.unwrap();
    }

    let entries = poker_dice.wallet().entries(host.id).await.unwrap();
    let moves: Vec<(EntryType, i64, i64)> = entries
        .iter()
        .map(|e| (e.entry_type, e.amount, e.balance_after))
        .collect();
    assert_eq!(
        moves,
        vec![
            (EntryType::Ante, -10, 90),
            (EntryType::Payout, 20, 110),
            (EntryType::Ante, -10, 100),
        ]
    );
    assert!(entries.iter().all(|e| e.game_id == Some(game_id)));
    assert_eq!(entries[0].direction, EntryDirection::Debit);
    assert_eq!(entries[0].idempotency_key, format!("ante_{game_id}_1_{}", host.id));
}

#[tokio::test]
async fn test_deposit_keys_are_private_to_each_account() {
    let poker_dice = setup();
    let alice = player(&poker_dice, "alice").await;
    let bob = player(&poker_dice, "bob").await;

    poker_dice
        .deposit(&alice.token, 5, Some("my-key".to_string()))
        .await
        .unwrap();
    let balance = poker_dice
        .deposit(&bob.token, 5, Some("my-key".to_string()))
        .await
        .unwrap();

    assert_eq!(balance, 105);
}

#[tokio::test]
async fn test_deposit_cannot_claim_a_payout() {
    let poker_dice = setup_with(PokerDiceConfig::default(), scripted(&[5]));
    let host = player(&poker_dice, "host").await;
    let guest = player(&poker_dice, "guest").await;
    let other = player(&poker_dice, "other").await;

    // Game and round IDs start at 1 on fresh storage
    for (depositor, account) in [(&other, &host), (&host, &host)] {
        poker_dice
            .deposit(
                &depositor.token,
                1,
                Some(format!("payout_1_1_{}", account.id)),
            )
            .await
            .unwrap();
    }

    let lobby_id = poker_dice
        .create_lobby(&host.token, settings(2, 2))
        .await
        .unwrap();
    poker_dice.join(&guest.token, lobby_id, None).await.unwrap();
    let game_id = poker_dice.start_game(&host.token, lobby_id).await.unwrap();
    assert_eq!(game_id, 1);
    assert_eq!(
        poker_dice.leave(&guest.token, lobby_id).await.unwrap(),
        LeaveOutcome::LobbyClosed
    );

    // The whole pot reached the host
    assert_eq!(poker_dice.wallet().balance(host.id).await.unwrap(), 111);
    assert_eq!(poker_dice.wallet().balance(guest.id).await.unwrap(), 90);
    let payout = poker_dice
        .wallet()
        .entries(host.id)
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.entry_type == EntryType::Payout)
        .expect("payout should be recorded");
    assert_eq!(payout.amount, 20);
}

#[tokio::test]
async fn test_deposit_overflowing_balance_is_rejected() {
    let poker_dice = setup();
    let alice = player(&poker_dice, "alice").await;

    let result = poker_dice.deposit(&alice.token, i64::MAX, None).await;

    assert!(matches!(
        result,
        Err(PokerDiceError::Wallet(WalletError::InvalidAmount(i64::MAX)))
    ));
    assert_eq!(poker_dice.wallet().balance(alice.id).await.unwrap(), 100);
    assert!(poker_dice.wallet().entries(alice.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unpayable_pot_refunds_antes() {
    let poker_dice = setup();
    let host = player(&poker_dice, "host").await;
    let guest = player(&poker_dice, "guest").await;
    for seated in [&host, &guest] {
        poker_dice
            .deposit(&seated.token, i64::MAX - 100, None)
            .await
            .unwrap();
    }

    // Two bets of more than half the range cannot form a pot
    let lobby = LobbySettings {
        min_credit: i64::MAX / 2 + 1,
        ..settings(2, 2)
    };
    let lobby_id = poker_dice.create_lobby(&host.token, lobby).await.unwrap();
    poker_dice.join(&guest.token, lobby_id, None).await.unwrap();
    poker_dice.start_game(&host.token, lobby_id).await.unwrap();

    for seated in [&host, &guest] {
        assert_eq!(
            poker_dice.wallet().balance(seated.id).await.unwrap(),
            i64::MAX
        );
        let kinds: Vec<EntryType> = poker_dice
            .wallet()
            .entries(seated.id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.entry_type)
            .collect();
        assert_eq!(
            kinds,
            vec![EntryType::Deposit, EntryType::Ante, EntryType::Refund]
        );
    }
    assert!(poker_dice.get_lobby(lobby_id).await.is_err());
}
