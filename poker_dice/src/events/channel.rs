//! Topic-based multicast channel.
//!
//! Every subscriber owns a bounded queue. `emit` and `subscribe` take the
//! same lock, so a subscriber observes exactly the events emitted after it
//! subscribed, in emission order. Each subscription ends with exactly one
//! [`Termination`].

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, Weak},
};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};

use super::models::{DomainEvent, EventEnvelope, EventKind, Topic};

/// How a subscription ended
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// Channel completed normally
    Completed,
    /// The subscribed topic went away (e.g. its lobby was deleted)
    TopicClosed,
    /// Channel terminated abnormally
    Failed(String),
    /// Subscriber fell behind and its queue overflowed
    Lagged,
}

/// Event channel errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// Channel was completed or failed
    #[error("Event channel is closed")]
    Closed,
}

/// Result type for event channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

struct Subscriber {
    topic: Topic,
    sender: mpsc::Sender<EventEnvelope>,
    done: oneshot::Sender<Termination>,
}

impl Subscriber {
    fn terminate(self, termination: Termination) {
        // the subscription may already be gone
        let _ = self.done.send(termination);
    }
}

struct ChannelState {
    subscribers: BTreeMap<u64, Subscriber>,
    next_subscriber: u64,
    next_seq: u64,
    closed: Option<Termination>,
    last_activity: Instant,
}

fn lock(state: &Mutex<ChannelState>) -> MutexGuard<'_, ChannelState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Push channel for domain events
#[derive(Clone)]
pub struct EventChannel {
    state: Arc<Mutex<ChannelState>>,
    capacity: usize,
}

impl EventChannel {
    /// Create a channel whose subscribers buffer up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChannelState {
                subscribers: BTreeMap::new(),
                next_subscriber: 0,
                next_seq: 0,
                closed: None,
                last_activity: Instant::now(),
            })),
            capacity: capacity.max(1),
        }
    }

    /// Open a feed for `topic`
    pub fn subscribe(&self, topic: Topic) -> ChannelResult<Subscription> {
        let mut state = lock(&self.state);
        if state.closed.is_some() {
            return Err(ChannelError::Closed);
        }

        let (sender, receiver) = mpsc::channel(self.capacity);
        let (done, termination) = oneshot::channel();
        state.next_subscriber += 1;
        let id = state.next_subscriber;
        state.subscribers.insert(
            id,
            Subscriber {
                topic,
                sender,
                done,
            },
        );

        debug!("Subscriber {id} joined {topic}");
        Ok(Subscription {
            id,
            topic,
            receiver,
            termination: Some(termination),
            unseen: 0,
            channel: Arc::downgrade(&self.state),
        })
    }

    /// Deliver an event to every current subscriber of its topic.
    ///
    /// Returns the event's sequence number.
    pub fn emit(&self, event: impl Into<DomainEvent>) -> ChannelResult<u64> {
        let event = event.into();
        let topic = event.topic();

        let mut state = lock(&self.state);
        if state.closed.is_some() {
            return Err(ChannelError::Closed);
        }

        state.next_seq += 1;
        state.last_activity = Instant::now();
        let envelope = EventEnvelope {
            seq: state.next_seq,
            topic,
            event,
        };

        let mut lagged = vec![];
        let mut gone = vec![];
        for (&id, subscriber) in &state.subscribers {
            if topic.is_some_and(|topic| topic != subscriber.topic) {
                continue;
            }
            match subscriber.sender.try_send(envelope.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => lagged.push(id),
                Err(mpsc::error::TrySendError::Closed(_)) => gone.push(id),
            }
        }

        for id in gone {
            debug!("Subscriber {id} disconnected, removing");
            state.subscribers.remove(&id);
        }
        for id in lagged {
            warn!("Subscriber {id} queue full, dropping it as lagging");
            if let Some(subscriber) = state.subscribers.remove(&id) {
                subscriber.terminate(Termination::Lagged);
            }
        }

        Ok(envelope.seq)
    }

    /// End the subscriptions of one topic with [`Termination::TopicClosed`]
    pub fn close_topic(&self, topic: Topic) {
        let mut state = lock(&self.state);
        let ids: Vec<u64> = state
            .subscribers
            .iter()
            .filter(|(_, s)| s.topic == topic)
            .map(|(&id, _)| id)
            .collect();

        for id in ids {
            if let Some(subscriber) = state.subscribers.remove(&id) {
                subscriber.terminate(Termination::TopicClosed);
            }
        }
    }

    /// Close the channel normally
    pub fn complete(&self) {
        self.close(Termination::Completed);
    }

    /// Terminate the channel abnormally
    pub fn fail(&self, reason: impl Into<String>) {
        self.close(Termination::Failed(reason.into()));
    }

    fn close(&self, termination: Termination) {
        let mut state = lock(&self.state);
        if state.closed.is_some() {
            return;
        }

        state.closed = Some(termination.clone());
        for (_, subscriber) in std::mem::take(&mut state.subscribers) {
            subscriber.terminate(termination.clone());
        }
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed.is_some()
    }

    /// Moment of the latest emit
    pub fn last_activity(&self) -> Instant {
        lock(&self.state).last_activity
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.state).subscribers.len()
    }
}

/// Receiving end of one feed. Dropping it unregisters the subscriber.
pub struct Subscription {
    id: u64,
    topic: Topic,
    receiver: mpsc::Receiver<EventEnvelope>,
    termination: Option<oneshot::Receiver<Termination>>,
    unseen: usize,
    channel: Weak<Mutex<ChannelState>>,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Next event; `None` once the subscription has ended and its queue is
    /// drained
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        let envelope = self.receiver.recv().await?;
        self.count(&envelope);
        Some(envelope)
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<EventEnvelope> {
        let envelope = self.receiver.try_recv().ok()?;
        self.count(&envelope);
        Some(envelope)
    }

    fn count(&mut self, envelope: &EventEnvelope) {
        if envelope.event.is_notable() {
            self.unseen += 1;
        }
    }

    /// Events received since the last [`Subscription::mark_seen`],
    /// keep-alives excluded
    pub fn unseen(&self) -> usize {
        self.unseen
    }

    pub fn mark_seen(&mut self) {
        self.unseen = 0;
    }

    /// Wait for the subscription to end. Yields the termination once; later
    /// calls return `None`.
    pub async fn termination(&mut self) -> Option<Termination> {
        self.termination.take()?.await.ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(state) = self.channel.upgrade() {
            lock(&state).subscribers.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{KeepAlive, LobbyCreated, LobbyDeleted, PlayerJoined};
    use chrono::Utc;

    fn joined(lobby_id: i64, account_id: i64) -> PlayerJoined {
        PlayerJoined {
            lobby_id,
            account_id,
            player_count: 2,
        }
    }

    fn drain(subscription: &mut Subscription) -> Vec<u64> {
        std::iter::from_fn(|| subscription.try_recv())
            .map(|e| e.seq)
            .collect()
    }

    #[tokio::test]
    async fn test_events_reach_only_their_topic() {
        let channel = EventChannel::new(16);
        let mut lobby_one = channel.subscribe(Topic::Lobby(1)).unwrap();
        let mut lobby_two = channel.subscribe(Topic::Lobby(2)).unwrap();

        channel.emit(joined(1, 10)).unwrap();

        assert_eq!(lobby_one.recv().await.unwrap().kind(), "player_joined");
        assert!(lobby_two.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_only_later_events() {
        let channel = EventChannel::new(16);
        let mut early = channel.subscribe(Topic::Lobbies).unwrap();

        let mut seqs = vec![];
        for id in 1..=3 {
            seqs.push(channel.emit(LobbyDeleted { lobby_id: id }).unwrap());
        }
        let mut late = channel.subscribe(Topic::Lobbies).unwrap();
        for id in 4..=5 {
            seqs.push(channel.emit(LobbyDeleted { lobby_id: id }).unwrap());
        }

        assert_eq!(drain(&mut early), seqs);
        assert_eq!(drain(&mut late), seqs[3..].to_vec());
    }

    #[tokio::test]
    async fn test_keep_alive_reaches_everyone_without_counting() {
        let channel = EventChannel::new(16);
        let mut lobbies = channel.subscribe(Topic::Lobbies).unwrap();
        let mut account = channel.subscribe(Topic::Account(3)).unwrap();

        channel.emit(KeepAlive { at: Utc::now() }).unwrap();

        assert_eq!(lobbies.recv().await.unwrap().kind(), "keep_alive");
        assert_eq!(account.recv().await.unwrap().kind(), "keep_alive");
        assert_eq!(lobbies.unseen(), 0);
    }

    #[tokio::test]
    async fn test_unseen_counter() {
        let channel = EventChannel::new(16);
        let mut feed = channel.subscribe(Topic::Lobby(1)).unwrap();

        channel.emit(joined(1, 10)).unwrap();
        channel.emit(joined(1, 11)).unwrap();
        drain(&mut feed);
        assert_eq!(feed.unseen(), 2);

        feed.mark_seen();
        assert_eq!(feed.unseen(), 0);
        channel.emit(joined(1, 12)).unwrap();
        drain(&mut feed);
        assert_eq!(feed.unseen(), 1);
    }

    #[tokio::test]
    async fn test_complete_terminates_everyone_once() {
        let channel = EventChannel::new(16);
        let mut feed = channel.subscribe(Topic::Lobbies).unwrap();
        channel.emit(LobbyDeleted { lobby_id: 1 }).unwrap();

        channel.complete();
        channel.fail("ignored after completion");

        // queued events stay readable
        assert!(feed.recv().await.is_some());
        assert!(feed.recv().await.is_none());
        assert_eq!(feed.termination().await, Some(Termination::Completed));
        assert_eq!(feed.termination().await, None);
    }

    #[tokio::test]
    async fn test_emit_after_close_fails_fast() {
        let channel = EventChannel::new(16);
        channel.fail("transport down");

        assert_eq!(
            channel.emit(LobbyDeleted { lobby_id: 1 }),
            Err(ChannelError::Closed)
        );
        assert!(matches!(
            channel.subscribe(Topic::Lobbies),
            Err(ChannelError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_failure_is_distinct_from_completion() {
        let channel = EventChannel::new(16);
        let mut feed = channel.subscribe(Topic::Lobbies).unwrap();
        channel.fail("transport down");
        assert_eq!(
            feed.termination().await,
            Some(Termination::Failed("transport down".to_string()))
        );
    }

    #[tokio::test]
    async fn test_close_topic() {
        let channel = EventChannel::new(16);
        let mut closing = channel.subscribe(Topic::Lobby(1)).unwrap();
        let _staying = channel.subscribe(Topic::Lobby(2)).unwrap();

        channel.close_topic(Topic::Lobby(1));

        assert_eq!(closing.termination().await, Some(Termination::TopicClosed));
        assert_eq!(channel.subscriber_count(), 1);
        assert!(!channel.is_closed());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_is_dropped() {
        let channel = EventChannel::new(2);
        let mut slow = channel.subscribe(Topic::Lobbies).unwrap();
        let mut fast = channel.subscribe(Topic::Lobbies).unwrap();

        for id in 1..=2 {
            channel.emit(LobbyDeleted { lobby_id: id }).unwrap();
        }
        assert_eq!(drain(&mut fast).len(), 2);
        channel.emit(LobbyDeleted { lobby_id: 3 }).unwrap();

        assert_eq!(slow.termination().await, Some(Termination::Lagged));
        assert_eq!(drain(&mut slow).len(), 2);
        assert_eq!(drain(&mut fast).len(), 1);
        assert_eq!(channel.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_drop_unregisters() {
        let channel = EventChannel::new(16);
        let feed = channel.subscribe(Topic::Lobbies).unwrap();
        assert_eq!(channel.subscriber_count(), 1);

        drop(feed);
        assert_eq!(channel.subscriber_count(), 0);
        assert!(channel.emit(LobbyDeleted { lobby_id: 1 }).is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_emitters_keep_per_subscriber_order() {
        let channel = EventChannel::new(1024);
        let mut feed = channel.subscribe(Topic::Lobbies).unwrap();

        let mut handles = vec![];
        for task in 0..4 {
            let channel = channel.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    let summary = crate::lobby::LobbySummary {
                        id: task * 100 + i,
                        name: "room".to_string(),
                        description: String::new(),
                        host_id: task,
                        is_private: false,
                        player_count: 1,
                        min_players: 2,
                        max_players: 4,
                        rounds: 3,
                        min_credit: 10,
                        turn_time_secs: 60,
                        running: false,
                    };
                    channel.emit(LobbyCreated { lobby: summary }).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let seqs = drain(&mut feed);
        assert_eq!(seqs.len(), 200);
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    }
}
