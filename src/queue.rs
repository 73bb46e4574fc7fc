//! Conversation queue registry
//!
//! One [`ConversationQueue`] per conversation, created lazily and kept
//! behind its own async mutex. Holding that mutex is what serialises state
//! transitions for a conversation; different conversations never contend.

use crate::media::MediaDescriptor;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Playback state of one conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// No session, empty queue
    #[default]
    Idle,
    /// Session active, a track is streaming
    Playing,
    /// Session active, playback suspended
    Paused,
    /// Session teardown in progress
    Stopping,
}

/// Pending tracks plus the "now playing" slot of one conversation
#[derive(Debug, Default)]
pub struct ConversationQueue {
    pending: VecDeque<MediaDescriptor>,
    now_playing: Option<MediaDescriptor>,
    state: PlaybackState,
}

impl ConversationQueue {
    /// Create an empty, idle queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to `pending`; returns the 1-based position among pending items
    pub fn push(&mut self, item: MediaDescriptor) -> usize {
        self.pending.push_back(item);
        self.pending.len()
    }

    /// Remove and return the head of `pending`. Leaves `now_playing` alone.
    pub fn pop_next(&mut self) -> Option<MediaDescriptor> {
        self.pending.pop_front()
    }

    /// Replace the "now playing" slot, returning the previous item.
    ///
    /// Setting an item moves the queue to `Playing`; clearing it to `Idle`.
    pub fn set_now_playing(&mut self, item: Option<MediaDescriptor>) -> Option<MediaDescriptor> {
        self.state = if item.is_some() {
            PlaybackState::Playing
        } else {
            PlaybackState::Idle
        };
        std::mem::replace(&mut self.now_playing, item)
    }

    /// Take the "now playing" item out, leaving the slot empty and the queue `Idle`
    pub fn take_now_playing(&mut self) -> Option<MediaDescriptor> {
        self.set_now_playing(None)
    }

    /// Empty both `pending` and `now_playing`, returning everything removed
    pub fn clear(&mut self) -> Vec<MediaDescriptor> {
        let mut removed: Vec<_> = self.now_playing.take().into_iter().collect();
        removed.extend(self.pending.drain(..));
        self.state = PlaybackState::Idle;
        removed
    }

    /// True only when nothing is pending and nothing is playing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.now_playing.is_none()
    }

    /// Currently streaming item
    #[must_use]
    pub const fn now_playing(&self) -> Option<&MediaDescriptor> {
        self.now_playing.as_ref()
    }

    /// Pending items in play order
    pub fn pending(&self) -> impl ExactSizeIterator<Item = &MediaDescriptor> {
        self.pending.iter()
    }

    /// Number of pending items
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Current playback state
    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    /// Mark an active session as paused or playing. Ignored without a track.
    pub fn set_paused(&mut self, paused: bool) {
        if self.now_playing.is_some() {
            self.state = if paused {
                PlaybackState::Paused
            } else {
                PlaybackState::Playing
            };
        }
    }

    /// Enter the transient teardown state
    pub fn begin_stop(&mut self) {
        self.state = PlaybackState::Stopping;
    }
}

/// Shared handle to one conversation's queue
pub type QueueHandle = Arc<Mutex<ConversationQueue>>;

/// Concurrency-safe mapping from conversation id to queue
///
/// Generic over the id type so any transport can key it:
/// - Telegram: `i64` (chat id)
/// - Discord: `u64` (guild snowflake)
pub struct QueueRegistry<Id: Hash + Eq + Clone + Send + Sync + std::fmt::Debug + 'static> {
    queues: RwLock<HashMap<Id, QueueHandle>>,
}

impl<Id: Hash + Eq + Clone + Send + Sync + std::fmt::Debug + 'static> Default
    for QueueRegistry<Id>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: Hash + Eq + Clone + Send + Sync + std::fmt::Debug + 'static> QueueRegistry<Id> {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
        }
    }

    /// Get the queue for `id`, creating it on first reference.
    ///
    /// Repeated calls with the same id return the same instance.
    pub async fn get_or_create(&self, id: &Id) -> QueueHandle {
        {
            let queues = self.queues.read().await;
            if let Some(queue) = queues.get(id) {
                return queue.clone();
            }
        }

        // Re-check under the write lock: another task may have created it
        let mut queues = self.queues.write().await;
        queues
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(conversation = ?id, "Creating conversation queue");
                Arc::new(Mutex::new(ConversationQueue::new()))
            })
            .clone()
    }

    /// Get the queue for `id` if it exists
    pub async fn get(&self, id: &Id) -> Option<QueueHandle> {
        let queues = self.queues.read().await;
        queues.get(id).cloned()
    }

    /// Append an item; returns its 1-based position among pending items
    pub async fn enqueue(&self, id: &Id, item: MediaDescriptor) -> usize {
        let queue = self.get_or_create(id).await;
        let position = queue.lock().await.push(item);
        position
    }

    /// Remove and return the head of the pending items
    pub async fn pop_next(&self, id: &Id) -> Option<MediaDescriptor> {
        let queue = self.get_or_create(id).await;
        let next = queue.lock().await.pop_next();
        next
    }

    /// Replace the "now playing" slot, returning the previous item
    pub async fn set_now_playing(
        &self,
        id: &Id,
        item: Option<MediaDescriptor>,
    ) -> Option<MediaDescriptor> {
        let queue = self.get_or_create(id).await;
        let previous = queue.lock().await.set_now_playing(item);
        previous
    }

    /// Empty both pending items and the "now playing" slot
    pub async fn clear(&self, id: &Id) -> Vec<MediaDescriptor> {
        let queue = self.get_or_create(id).await;
        let removed = queue.lock().await.clear();
        removed
    }

    /// True when nothing is pending and nothing is playing
    pub async fn is_empty(&self, id: &Id) -> bool {
        let Some(queue) = self.get(id).await else {
            return true;
        };
        let empty = queue.lock().await.is_empty();
        empty
    }

    /// Drop empty, idle queues nobody is currently using.
    ///
    /// A queue whose handle is held outside the registry is kept even when
    /// unlocked: the holder may be about to lock it and start a session.
    /// Returns the number of queues removed.
    pub async fn prune_idle(&self) -> usize {
        let mut queues = self.queues.write().await;
        let before = queues.len();
        queues.retain(|_, queue| {
            if Arc::strong_count(queue) > 1 {
                return true;
            }
            match queue.try_lock() {
                Ok(guard) => !(guard.is_empty() && guard.state() == PlaybackState::Idle),
                Err(_) => true,
            }
        });
        before - queues.len()
    }

    /// Number of known conversations
    pub async fn len(&self) -> usize {
        let queues = self.queues.read().await;
        queues.len()
    }

    /// Check if no conversation has a queue
    pub async fn is_empty_registry(&self) -> bool {
        let queues = self.queues.read().await;
        queues.is_empty()
    }
}

/// Registry keyed by Telegram chat id
pub type ChatQueueRegistry = QueueRegistry<i64>;
