//! Shared helpers for integration tests.

#![allow(dead_code)]

use poker_dice::{
    PokerDice, PokerDiceConfig,
    auth::{AccountId, RegisterRequest},
    clock::SystemClock,
    db::Repositories,
    events::{EventEnvelope, Subscription},
    game::{DiceRoller, Die, RandomDiceRoller, Score, Scorer, ScriptedDiceRoller},
    lobby::LobbySettings,
};
use std::{sync::Arc, time::Duration};

pub const PASSWORD: &str = "SecurePass123";

/// A registered, authenticated account
pub struct Player {
    pub id: AccountId,
    pub token: String,
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Scores a roll as the sum of its faces
pub fn sum_scorer() -> Arc<dyn Scorer> {
    Arc::new(|dice: &[Die]| Score(dice.iter().map(|d| u64::from(d.face())).sum()))
}

pub fn faces(faces: &[u8]) -> Vec<Die> {
    Die::from_faces(faces).expect("valid faces")
}

pub fn scripted(script: &[u8]) -> Arc<dyn DiceRoller> {
    Arc::new(ScriptedDiceRoller::new(faces(script)))
}

/// Facade over fresh in-memory storage
pub fn setup_with(config: PokerDiceConfig, roller: Arc<dyn DiceRoller>) -> PokerDice {
    init_logging();
    PokerDice::with_parts(
        config,
        Repositories::in_memory(),
        Arc::new(SystemClock),
        sum_scorer(),
        roller,
    )
}

pub fn setup() -> PokerDice {
    setup_with(PokerDiceConfig::default(), Arc::new(RandomDiceRoller))
}

/// Register and log in an account
pub async fn player(poker_dice: &PokerDice, username: &str) -> Player {
    let account = poker_dice
        .register(RegisterRequest {
            username: username.to_string(),
            display_name: username.to_string(),
            age: 30,
            password: PASSWORD.to_string(),
        })
        .await
        .expect("registration should succeed");
    let token = poker_dice
        .authenticate(username, PASSWORD)
        .await
        .expect("login should succeed");

    Player {
        id: account.id,
        token: token.token,
    }
}

pub fn settings(max_players: usize, rounds: u8) -> LobbySettings {
    LobbySettings {
        name: "Test lobby".to_string(),
        max_players,
        rounds,
        ..Default::default()
    }
}

/// Next delivered event, failing the test if none arrives in time
pub async fn next_event(subscription: &mut Subscription) -> EventEnvelope {
    tokio::time::timeout(Duration::from_secs(5), subscription.recv())
        .await
        .expect("event should arrive")
        .expect("subscription should be open")
}

/// Every event queued on the subscription right now
pub fn drain(subscription: &mut Subscription) -> Vec<EventEnvelope> {
    std::iter::from_fn(|| subscription.try_recv()).collect()
}
