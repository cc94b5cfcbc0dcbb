//! Integration tests for the push event channel as seen through the facade.

mod common;

use common::{drain, next_event, player, settings, setup, setup_with};
use poker_dice::{
    PokerDiceConfig, PokerDiceError,
    events::{ChannelError, CreditUpdated, DomainEvent, LobbyUpdated, Termination, Topic},
    game::RandomDiceRoller,
    wallet::EntryType,
};
use std::{sync::Arc, time::Duration};

#[tokio::test]
async fn test_lobbies_topic_announces_creation_and_deletion() {
    let poker_dice = setup();
    let watcher = player(&poker_dice, "watcher").await;
    let alice = player(&poker_dice, "alice").await;
    let bob = player(&poker_dice, "bob").await;

    let mut feed = poker_dice
        .subscribe(&watcher.token, Topic::Lobbies)
        .await
        .unwrap();

    let first = poker_dice
        .create_lobby(&alice.token, settings(4, 3))
        .await
        .unwrap();

    // Only events emitted after subscribing are delivered
    let mut late = poker_dice
        .subscribe(&watcher.token, Topic::Lobbies)
        .await
        .unwrap();

    let second = poker_dice
        .create_lobby(&bob.token, settings(4, 3))
        .await
        .unwrap();
    poker_dice.join(&watcher.token, second, None).await.unwrap();
    poker_dice.leave(&alice.token, first).await.unwrap();

    let events = drain(&mut feed);
    let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec!["lobby_created", "lobby_created", "lobby_updated", "lobby_deleted"]
    );
    assert!(events.windows(2).all(|pair| pair[0].seq < pair[1].seq));
    assert!(matches!(
        &events[3].event,
        DomainEvent::LobbyDeleted(deleted) if deleted.lobby_id == first
    ));

    let late_kinds: Vec<&str> = drain(&mut late).iter().map(|e| e.kind()).collect();
    assert_eq!(late_kinds, vec!["lobby_created", "lobby_updated", "lobby_deleted"]);
}

#[tokio::test]
async fn test_lobbies_topic_tracks_membership_and_start() {
    let poker_dice = setup();
    let watcher = player(&poker_dice, "watcher").await;
    let host = player(&poker_dice, "host").await;
    let guest = player(&poker_dice, "guest").await;
    let visitor = player(&poker_dice, "visitor").await;
    let lobby_id = poker_dice
        .create_lobby(&host.token, settings(3, 2))
        .await
        .unwrap();
    let mut feed = poker_dice
        .subscribe(&watcher.token, Topic::Lobbies)
        .await
        .unwrap();

    poker_dice.join(&guest.token, lobby_id, None).await.unwrap();
    poker_dice.join(&visitor.token, lobby_id, None).await.unwrap();
    assert!(poker_dice.list_open_lobbies().await.unwrap().is_empty());
    poker_dice.leave(&visitor.token, lobby_id).await.unwrap();
    assert_eq!(poker_dice.list_open_lobbies().await.unwrap().len(), 1);
    poker_dice.start_game(&host.token, lobby_id).await.unwrap();

    let updates: Vec<(usize, bool)> = drain(&mut feed)
        .into_iter()
        .filter_map(|envelope| match envelope.event {
            DomainEvent::LobbyUpdated(LobbyUpdated { lobby }) => {
                assert_eq!(lobby.id, lobby_id);
                Some((lobby.player_count, lobby.running))
            }
            _ => None,
        })
        .collect();
    assert_eq!(updates, vec![(2, false), (3, false), (2, false), (2, true)]);
    assert!(poker_dice.list_open_lobbies().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_lobby_topic_reports_membership_then_closes() {
    let poker_dice = setup();
    let host = player(&poker_dice, "host").await;
    let guest = player(&poker_dice, "guest").await;
    let lobby_id = poker_dice
        .create_lobby(&host.token, settings(4, 3))
        .await
        .unwrap();
    let mut feed = poker_dice
        .subscribe(&guest.token, Topic::Lobby(lobby_id))
        .await
        .unwrap();

    poker_dice.join(&guest.token, lobby_id, None).await.unwrap();
    let joined = next_event(&mut feed).await;
    match joined.event {
        DomainEvent::PlayerJoined(event) => {
            assert_eq!(event.account_id, guest.id);
            assert_eq!(event.player_count, 2);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(feed.unseen(), 1);
    feed.mark_seen();
    assert_eq!(feed.unseen(), 0);

    poker_dice.leave(&host.token, lobby_id).await.unwrap();

    assert_eq!(feed.termination().await, Some(Termination::TopicClosed));
    assert!(feed.recv().await.is_none());
}

#[tokio::test]
async fn test_account_topic_is_private() {
    let poker_dice = setup();
    let alice = player(&poker_dice, "alice").await;
    let mallory = player(&poker_dice, "mallory").await;

    let result = poker_dice
        .subscribe(&mallory.token, Topic::Account(alice.id))
        .await;
    assert!(matches!(result, Err(PokerDiceError::Forbidden)));

    assert!(
        poker_dice
            .subscribe(&alice.token, Topic::Account(alice.id))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_credit_changes_reach_account_topic() {
    let poker_dice = setup();
    let host = player(&poker_dice, "host").await;
    let guest = player(&poker_dice, "guest").await;
    let mut feed = poker_dice
        .subscribe(&host.token, Topic::Account(host.id))
        .await
        .unwrap();

    poker_dice.deposit(&host.token, 50, None).await.unwrap();
    let envelope = next_event(&mut feed).await;
    assert_eq!(envelope.topic, Some(Topic::Account(host.id)));
    assert_eq!(
        envelope.event,
        DomainEvent::CreditUpdated(CreditUpdated {
            account_id: host.id,
            balance: 150,
            change: 50,
            entry_type: EntryType::Deposit,
        })
    );

    // Another account's deposit stays off this feed
    poker_dice.deposit(&guest.token, 20, None).await.unwrap();

    let lobby_id = poker_dice
        .create_lobby(&host.token, settings(2, 2))
        .await
        .unwrap();
    poker_dice.join(&guest.token, lobby_id, None).await.unwrap();
    poker_dice.start_game(&host.token, lobby_id).await.unwrap();

    let events = drain(&mut feed);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0].event,
        DomainEvent::CreditUpdated(CreditUpdated {
            change: -10,
            balance: 140,
            entry_type: EntryType::Ante,
            ..
        })
    ));
}

#[tokio::test]
async fn test_slow_subscriber_is_dropped_as_lagging() {
    let mut config = PokerDiceConfig::default();
    config.events.subscriber_capacity = 2;
    let poker_dice = setup_with(config, Arc::new(RandomDiceRoller));
    let alice = player(&poker_dice, "alice").await;
    let mut feed = poker_dice
        .subscribe(&alice.token, Topic::Account(alice.id))
        .await
        .unwrap();

    for _ in 0..3 {
        poker_dice.deposit(&alice.token, 10, None).await.unwrap();
    }

    assert_eq!(feed.termination().await, Some(Termination::Lagged));
    assert_eq!(drain(&mut feed).len(), 2);
    assert_eq!(poker_dice.events().subscriber_count(), 0);
}

#[tokio::test]
async fn test_shutdown_completes_every_subscription() {
    let poker_dice = setup();
    let alice = player(&poker_dice, "alice").await;
    let mut lobbies = poker_dice
        .subscribe(&alice.token, Topic::Lobbies)
        .await
        .unwrap();
    let mut account = poker_dice
        .subscribe(&alice.token, Topic::Account(alice.id))
        .await
        .unwrap();

    poker_dice.shutdown();

    assert_eq!(lobbies.termination().await, Some(Termination::Completed));
    assert_eq!(account.termination().await, Some(Termination::Completed));
    assert!(matches!(
        poker_dice.subscribe(&alice.token, Topic::Lobbies).await,
        Err(PokerDiceError::Channel(ChannelError::Closed))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_idle_channel_sends_keep_alive() {
    let poker_dice = setup();
    let alice = player(&poker_dice, "alice").await;
    let mut feed = poker_dice
        .subscribe(&alice.token, Topic::Lobbies)
        .await
        .unwrap();
    let ticker = poker_dice.spawn_keep_alive();

    let interval = poker_dice.config().events.keep_alive_interval;
    tokio::time::sleep(interval + Duration::from_secs(1)).await;

    let envelope = feed.try_recv().expect("keep-alive should be queued");
    assert_eq!(envelope.kind(), "keep_alive");
    assert_eq!(envelope.topic, None);
    assert_eq!(feed.unseen(), 0);

    poker_dice.shutdown();
    ticker.await.unwrap();
}

#[tokio::test]
async fn test_envelope_serializes_to_json() {
    let poker_dice = setup();
    let alice = player(&poker_dice, "alice").await;
    let mut feed = poker_dice
        .subscribe(&alice.token, Topic::Lobbies)
        .await
        .unwrap();

    let lobby_id = poker_dice
        .create_lobby(&alice.token, settings(3, 2))
        .await
        .unwrap();
    let envelope = next_event(&mut feed).await;
    let json: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

    assert_eq!(json["event"]["kind"], "lobby_created");
    assert_eq!(json["event"]["lobby"]["id"], lobby_id);
    assert_eq!(json["event"]["lobby"]["host_id"], alice.id);
    assert_eq!(json["topic"]["topic"], "lobbies");
}
