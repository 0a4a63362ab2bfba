//! Server-sent event delivery of chat messages
//!
//! Each open stream follows one conversation from a client-held cursor (the
//! id of the last message it already has). The database stays the source of
//! truth: the stream re-reads everything past the cursor whenever the
//! conversation's broadcast channel signals a new message, or when the poll
//! interval elapses, whichever comes first. Every read is followed by a
//! heartbeat comment so proxies and clients can tell the connection is alive.
//!
//! Access is re-checked before every read after the first: the stream ends
//! once the viewer's access token expires or the viewer may no longer write
//! to the conversation.

use axum::response::sse::Event;
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    sync::Arc,
    time::Duration,
};
use tokio::sync::{
    RwLock,
    broadcast::{self, error::RecvError, error::TryRecvError},
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::models::conversation::Message;

/// Comment text sent after each read
pub const HEARTBEAT: &str = "heartbeat";

/// Per-conversation wake-up channels.
///
/// Carries message ids only; subscribers fetch the rows themselves.
#[derive(Clone)]
pub struct MessageHub {
    capacity: usize,
    channels: Arc<RwLock<HashMap<i64, broadcast::Sender<i64>>>>,
}

impl MessageHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe to new-message signals of a conversation
    pub async fn subscribe(&self, conversation_id: i64) -> broadcast::Receiver<i64> {
        let mut channels = self.channels.write().await;
        channels
            .entry(conversation_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Signal that `message_id` was stored in `conversation_id`
    pub async fn publish(&self, conversation_id: i64, message_id: i64) {
        let delivered = {
            let channels = self.channels.read().await;
            match channels.get(&conversation_id) {
                Some(sender) => sender.send(message_id).is_ok(),
                None => return,
            }
        };

        // Nobody listening any more
        if !delivered {
            let mut channels = self.channels.write().await;
            if channels
                .get(&conversation_id)
                .is_some_and(|sender| sender.receiver_count() == 0)
            {
                channels.remove(&conversation_id);
            }
        }
    }

    /// Drop channels whose subscribers have all disconnected
    pub async fn cleanup(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, sender| sender.receiver_count() > 0);
    }

    /// Number of conversations with a live channel
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

/// Source of stored messages for a stream
pub trait MessageFeed: Clone + Send + Sync + 'static {
    /// Messages of `conversation_id` with an id greater than `after_id`, ascending
    fn messages_after(
        &self,
        conversation_id: i64,
        after_id: i64,
    ) -> impl Future<Output = anyhow::Result<Vec<Message>>> + Send;

    /// Whether `user_id` may still follow `conversation_id`
    fn may_stream(
        &self,
        conversation_id: i64,
        user_id: Uuid,
    ) -> impl Future<Output = anyhow::Result<bool>> + Send;
}

/// Who a stream is delivered to
#[derive(Debug, Clone, Copy)]
pub struct StreamViewer {
    pub user_id: Uuid,
    /// Expiry of the access token the stream was opened with
    pub expires_at: DateTime<Utc>,
}

/// One unit pushed to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    Message(Message),
    Heartbeat,
}

impl StreamItem {
    /// Render as a complete SSE event
    pub fn into_event(self) -> Event {
        match self {
            StreamItem::Message(message) => {
                let id = message.id.to_string();
                match Event::default().id(id).json_data(&message) {
                    Ok(event) => event,
                    Err(e) => {
                        error!("Failed to serialize message {}: {}", message.id, e);
                        Event::default().comment("unserializable message")
                    }
                }
            }
            StreamItem::Heartbeat => Event::default().comment(HEARTBEAT),
        }
    }
}

/// Tunables for a message stream
#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    /// Longest wait between two reads when nothing is published
    pub poll_interval: Duration,
}

struct StreamState<F> {
    feed: F,
    conversation_id: i64,
    viewer: StreamViewer,
    cursor: i64,
    wakeups: Option<broadcast::Receiver<i64>>,
    settings: StreamSettings,
    pending: VecDeque<StreamItem>,
    primed: bool,
    closed: bool,
}

impl<F: MessageFeed> StreamState<F> {
    /// Time left before the next read is due, capped at the token's expiry
    fn next_deadline(&self) -> Duration {
        let until_expiry = (self.viewer.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.settings.poll_interval.min(until_expiry)
    }

    /// Sleep until a message is published or the poll interval elapses
    async fn wait_for_activity(&mut self) {
        let deadline = self.next_deadline();
        let channel_closed = match self.wakeups.as_mut() {
            Some(rx) => {
                let closed = tokio::select! {
                    _ = tokio::time::sleep(deadline) => false,
                    result = rx.recv() => matches!(result, Err(RecvError::Closed)),
                };
                // Coalesce a burst of signals into one read
                loop {
                    match rx.try_recv() {
                        Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    }
                }
                closed
            }
            None => {
                tokio::time::sleep(deadline).await;
                false
            }
        };

        if channel_closed {
            self.wakeups = None;
        }
    }

    async fn still_authorized(&mut self) -> bool {
        if Utc::now() >= self.viewer.expires_at {
            info!(
                "Access token of {} expired, closing stream for conversation {}",
                self.viewer.user_id, self.conversation_id
            );
            return false;
        }

        match self
            .feed
            .may_stream(self.conversation_id, self.viewer.user_id)
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                info!(
                    "User {} lost access to conversation {}, closing stream",
                    self.viewer.user_id, self.conversation_id
                );
                false
            }
            Err(e) => {
                error!(
                    "Closing stream for conversation {}: {}",
                    self.conversation_id, e
                );
                false
            }
        }
    }

    async fn fill(&mut self) {
        match self
            .feed
            .messages_after(self.conversation_id, self.cursor)
            .await
        {
            Ok(messages) => {
                for message in messages {
                    if message.id <= self.cursor {
                        continue;
                    }
                    self.cursor = message.id;
                    self.pending.push_back(StreamItem::Message(message));
                }
                self.pending.push_back(StreamItem::Heartbeat);
            }
            Err(e) => {
                error!(
                    "Closing stream for conversation {}: {}",
                    self.conversation_id, e
                );
                self.closed = true;
            }
        }
    }
}

/// Stream every message of `conversation_id` after `cursor` to `viewer`.
///
/// Subscribe `wakeups` before calling so nothing published between the first
/// read and the subscription is missed. The stream ends when the feed fails
/// or the viewer loses access; a client disconnect simply drops it.
pub fn message_stream<F: MessageFeed>(
    feed: F,
    conversation_id: i64,
    viewer: StreamViewer,
    cursor: i64,
    wakeups: broadcast::Receiver<i64>,
    settings: StreamSettings,
) -> impl Stream<Item = StreamItem> + Send {
    let state = StreamState {
        feed,
        conversation_id,
        viewer,
        cursor: cursor.max(0),
        wakeups: Some(wakeups),
        settings,
        pending: VecDeque::new(),
        primed: false,
        closed: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.closed {
                debug!("Message stream for {} finished", state.conversation_id);
                return None;
            }
            if state.primed {
                state.wait_for_activity().await;
                if !state.still_authorized().await {
                    state.closed = true;
                    continue;
                }
            }
            state.primed = true;
            state.fill().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures::StreamExt;
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    };
    use uuid::Uuid;

    #[derive(Clone, Default)]
    struct MemoryFeed {
        messages: Arc<Mutex<Vec<Message>>>,
        failing: Arc<AtomicBool>,
        revoked: Arc<AtomicBool>,
    }

    impl MemoryFeed {
        fn with_ids(conversation_id: i64, ids: impl IntoIterator<Item = i64>) -> Self {
            let feed = Self::default();
            for id in ids {
                feed.push(conversation_id, id);
            }
            feed
        }

        fn push(&self, conversation_id: i64, id: i64) {
            self.messages.lock().unwrap().push(Message {
                id,
                conversation_id,
                sender_id: Uuid::nil(),
                content: format!("message {}", id),
                read: false,
                sent_at: Utc::now(),
            });
        }
    }

    impl MessageFeed for MemoryFeed {
        async fn messages_after(
            &self,
            conversation_id: i64,
            after_id: i64,
        ) -> anyhow::Result<Vec<Message>> {
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("connection reset");
            }
            let mut found: Vec<Message> = self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.conversation_id == conversation_id && m.id > after_id)
                .cloned()
                .collect();
            found.sort_by_key(|m| m.id);
            Ok(found)
        }

        async fn may_stream(&self, _conversation_id: i64, _user_id: Uuid) -> anyhow::Result<bool> {
            Ok(!self.revoked.load(Ordering::SeqCst))
        }
    }

    fn settings(poll_interval: Duration) -> StreamSettings {
        StreamSettings { poll_interval }
    }

    fn viewer() -> StreamViewer {
        StreamViewer {
            user_id: Uuid::new_v4(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        }
    }

    fn message_id(item: &StreamItem) -> Option<i64> {
        match item {
            StreamItem::Message(message) => Some(message.id),
            StreamItem::Heartbeat => None,
        }
    }

    #[tokio::test]
    async fn test_resume_delivers_only_messages_after_cursor() {
        let feed = MemoryFeed::with_ids(1, 1..=8);
        let hub = MessageHub::new(16);
        let rx = hub.subscribe(1).await;

        let items: Vec<StreamItem> = message_stream(feed, 1, viewer(), 5, rx, settings(Duration::from_secs(60)))
            .take(4)
            .collect()
            .await;

        let ids: Vec<Option<i64>> = items.iter().map(message_id).collect();
        assert_eq!(ids, vec![Some(6), Some(7), Some(8), None]);
    }

    #[tokio::test]
    async fn test_other_conversations_are_not_delivered() {
        let feed = MemoryFeed::with_ids(1, [1, 3]);
        feed.push(2, 2);
        let hub = MessageHub::new(16);
        let rx = hub.subscribe(1).await;

        let items: Vec<StreamItem> = message_stream(feed, 1, viewer(), 0, rx, settings(Duration::from_secs(60)))
            .take(3)
            .collect()
            .await;

        let ids: Vec<Option<i64>> = items.iter().map(message_id).collect();
        assert_eq!(ids, vec![Some(1), Some(3), None]);
    }

    #[tokio::test]
    async fn test_publish_wakes_the_stream() {
        let feed = MemoryFeed::default();
        let hub = MessageHub::new(16);
        let rx = hub.subscribe(4).await;

        let stream = message_stream(feed.clone(), 4, viewer(), 0, rx, settings(Duration::from_secs(3600)));
        tokio::pin!(stream);

        assert_eq!(stream.next().await, Some(StreamItem::Heartbeat));

        feed.push(4, 10);
        hub.publish(4, 10).await;

        let next = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("stream should wake up on publish");
        assert_eq!(next.as_ref().and_then(message_id), Some(10));
        assert_eq!(stream.next().await, Some(StreamItem::Heartbeat));
    }

    #[tokio::test]
    async fn test_poll_interval_picks_up_unpublished_writes() {
        let feed = MemoryFeed::default();
        let hub = MessageHub::new(16);
        let rx = hub.subscribe(9).await;

        let stream = message_stream(feed.clone(), 9, viewer(), 0, rx, settings(Duration::from_millis(20)));
        tokio::pin!(stream);

        assert_eq!(stream.next().await, Some(StreamItem::Heartbeat));
        feed.push(9, 1);

        let next = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("poll interval should trigger a read");
        assert_eq!(next.as_ref().and_then(message_id), Some(1));
    }

    #[tokio::test]
    async fn test_no_duplicates_across_reads() {
        let feed = MemoryFeed::with_ids(3, [1, 2]);
        let hub = MessageHub::new(16);
        let rx = hub.subscribe(3).await;

        let stream = message_stream(feed.clone(), 3, viewer(), 0, rx, settings(Duration::from_millis(10)));
        tokio::pin!(stream);

        let mut delivered = Vec::new();
        feed.push(3, 3);
        while delivered.len() < 3 {
            let item = tokio::time::timeout(Duration::from_secs(5), stream.next())
                .await
                .unwrap()
                .unwrap();
            if let Some(id) = message_id(&item) {
                delivered.push(id);
            }
        }
        assert_eq!(delivered, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_feed_failure_ends_the_stream() {
        let feed = MemoryFeed::with_ids(1, [1]);
        let hub = MessageHub::new(16);
        let rx = hub.subscribe(1).await;

        let stream = message_stream(feed.clone(), 1, viewer(), 0, rx, settings(Duration::from_millis(10)));
        tokio::pin!(stream);

        assert_eq!(stream.next().await.as_ref().and_then(message_id), Some(1));
        assert_eq!(stream.next().await, Some(StreamItem::Heartbeat));

        feed.failing.store(true, Ordering::SeqCst);
        let end = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap();
        assert_eq!(end, None);
    }

    #[tokio::test]
    async fn test_hub_drops_channels_without_subscribers() {
        let hub = MessageHub::new(4);

        // Publishing to a conversation nobody follows is a no-op
        hub.publish(1, 1).await;
        assert_eq!(hub.channel_count().await, 0);

        let mut rx = hub.subscribe(1).await;
        hub.publish(1, 42).await;
        assert_eq!(rx.recv().await.unwrap(), 42);

        drop(rx);
        hub.publish(1, 43).await;
        assert_eq!(hub.channel_count().await, 0);

        let _rx = hub.subscribe(2).await;
        hub.cleanup().await;
        assert_eq!(hub.channel_count().await, 1);
    }

    #[tokio::test]
    async fn test_revoked_access_ends_the_stream() {
        let feed = MemoryFeed::with_ids(5, [1]);
        let hub = MessageHub::new(16);
        let rx = hub.subscribe(5).await;

        let stream = message_stream(feed.clone(), 5, viewer(), 0, rx, settings(Duration::from_millis(10)));
        tokio::pin!(stream);

        assert_eq!(stream.next().await.as_ref().and_then(message_id), Some(1));
        assert_eq!(stream.next().await, Some(StreamItem::Heartbeat));

        // Unmatched or removed participants stop receiving messages
        feed.revoked.store(true, Ordering::SeqCst);
        feed.push(5, 2);
        hub.publish(5, 2).await;

        let end = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap();
        assert_eq!(end, None);
    }

    #[tokio::test]
    async fn test_expired_token_ends_the_stream() {
        let feed = MemoryFeed::default();
        let hub = MessageHub::new(16);
        let rx = hub.subscribe(6).await;
        let viewer = StreamViewer {
            user_id: Uuid::new_v4(),
            expires_at: Utc::now() + chrono::Duration::milliseconds(100),
        };

        // The poll interval alone would keep the stream quiet for an hour
        let stream = message_stream(feed.clone(), 6, viewer, 0, rx, settings(Duration::from_secs(3600)));
        tokio::pin!(stream);

        assert_eq!(stream.next().await, Some(StreamItem::Heartbeat));

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(item) = stream.next().await {
                assert_eq!(item, StreamItem::Heartbeat);
            }
        })
        .await;
        assert!(drained.is_ok(), "stream should close once the token expires");
    }
}
