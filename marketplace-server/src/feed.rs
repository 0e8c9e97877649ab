//! Change feed
//!
//! Fan-out of [`ChangeEvent`]s to every interested client. Delivery is
//! best-effort: a subscriber that falls behind the channel capacity receives a
//! [`FeedMessage::Resync`] instead of the events it missed and must re-fetch
//! authoritative state. Handlers must tolerate duplicates.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use marketplace_core::UserId;

use crate::store::{ChangeEvent, Table};

/// Default broadcast buffer size
pub const DEFAULT_CAPACITY: usize = 256;

/// Which events a subscriber wants
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    /// Empty means every table
    pub tables: Vec<Table>,
    pub user_id: Option<UserId>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn table(table: Table) -> Self {
        Self {
            tables: vec![table],
            user_id: None,
        }
    }

    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        (self.tables.is_empty() || self.tables.contains(&event.table))
            && self.user_id.map_or(true, |u| u == event.user_id)
    }
}

/// What a subscriber receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    Change(ChangeEvent),
    /// Events were dropped; local state can no longer be patched incrementally
    Resync { missed: u64 },
}

pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
    seq: AtomicU64,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            seq: AtomicU64::new(1),
        }
    }

    /// Publish events of a committed batch.
    ///
    /// `seq` is assigned here, so it orders publication: events of one batch
    /// are numbered in order, but two batches committed concurrently
    /// may be numbered in the opposite order of their commits.
    pub fn publish(&self, events: Vec<ChangeEvent>) {
        for mut event in events {
            event.seq = self.seq.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(
                seq = event.seq,
                table = ?event.table,
                op = ?event.op,
                key = %event.key,
                "Publishing change"
            );
            // An error only means nobody is listening right now
            let _ = self.sender.send(event);
        }
    }

    pub fn subscribe(&self, filter: Filter) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    /// Unfiltered receiver, for streaming transports
    pub fn receiver(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Run `handler` for every matching message on a background task until the
    /// returned handle is unsubscribed or dropped.
    pub fn listen<F>(&self, filter: Filter, mut handler: F) -> ListenerHandle
    where
        F: FnMut(FeedMessage) + Send + 'static,
    {
        let mut subscription = self.subscribe(filter);
        let task = tokio::spawn(async move {
            while let Some(message) = subscription.recv().await {
                handler(message);
            }
        });
        ListenerHandle { task: Some(task) }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    filter: Filter,
}

impl Subscription {
    /// Wait for the next matching message. `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<FeedMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(FeedMessage::Change(event)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Change feed subscriber lagged");
                    return Some(FeedMessage::Resync { missed });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching message if one is already buffered
    pub fn try_recv(&mut self) -> Option<FeedMessage> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Some(FeedMessage::Change(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    return Some(FeedMessage::Resync { missed })
                }
                Err(_) => return None,
            }
        }
    }
}

/// Handle of a [`ChangeFeed::listen`] task
pub struct ListenerHandle {
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ChangeOp;

    fn event(table: Table, user_id: UserId) -> ChangeEvent {
        ChangeEvent::new(table, ChangeOp::Update, user_id, user_id)
    }

    #[test]
    fn test_filter_matching() {
        let alice = UserId::new();
        let bob = UserId::new();

        assert!(Filter::all().matches(&event(Table::Services, alice)));
        assert!(Filter::table(Table::Profiles).matches(&event(Table::Profiles, bob)));
        assert!(!Filter::table(Table::Profiles).matches(&event(Table::Services, bob)));

        let only_alice = Filter::table(Table::Profiles).for_user(alice);
        assert!(only_alice.matches(&event(Table::Profiles, alice)));
        assert!(!only_alice.matches(&event(Table::Profiles, bob)));
    }

    #[test]
    fn test_publish_assigns_increasing_seq() {
        let feed = ChangeFeed::new(8);
        let mut sub = feed.subscribe(Filter::all());
        let user = UserId::new();

        feed.publish(vec![event(Table::Profiles, user), event(Table::Services, user)]);

        let first = sub.try_recv();
        let second = sub.try_recv();
        match (first, second) {
            (Some(FeedMessage::Change(a)), Some(FeedMessage::Change(b))) => assert!(a.seq < b.seq),
            other => panic!("unexpected messages: {other:?}"),
        }
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_publish_without_subscribers_is_harmless() {
        let feed = ChangeFeed::new(8);
        feed.publish(vec![event(Table::Profiles, UserId::new())]);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn test_lagging_subscriber_gets_resync() {
        let feed = ChangeFeed::new(2);
        let mut sub = feed.subscribe(Filter::all());
        let user = UserId::new();

        feed.publish((0..5).map(|_| event(Table::Profiles, user)).collect());

        assert!(matches!(sub.try_recv(), Some(FeedMessage::Resync { missed: 3 })));
        assert!(matches!(sub.try_recv(), Some(FeedMessage::Change(_))));
    }
}
