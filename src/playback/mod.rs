//! Playback scheduler
//!
//! Drives one "now playing" slot per conversation on top of the queue
//! registry and the media transport. Every transition takes the
//! conversation's queue lock for its whole read-modify-write, including the
//! transport call, so user commands and stream-ended events for the same
//! conversation never interleave.

/// HTTP voice-bridge transport
pub mod bridge;
/// Media transport trait and events
pub mod transport;

pub use bridge::BridgeTransport;
pub use transport::{MediaTransport, TransportError, TransportEvent};

use crate::media::{self, MediaDescriptor};
use crate::queue::{ChatQueueRegistry, ConversationQueue, PlaybackState};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Errors surfaced to users by playback commands
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// Nothing is playing or queued
    #[error("nothing is playing")]
    NothingPlaying,
    /// The command does not apply in the current state
    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        /// Requested operation
        operation: &'static str,
        /// State the conversation was in
        state: PlaybackState,
    },
    /// The transport rejected the control operation
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// What happened to an enqueued item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The queue was idle; the item is streaming now
    PlayingNow,
    /// The item waits behind the current track
    Queued {
        /// 1-based position among pending items
        position: usize,
    },
}

/// Result of advancing to the next item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// A new item is streaming
    Started(MediaDescriptor),
    /// The queue ran dry and the session was ended
    Finished,
}

/// Point-in-time copy of a conversation's queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// Playback state
    pub state: PlaybackState,
    /// Currently streaming item
    pub now_playing: Option<MediaDescriptor>,
    /// Pending items in play order
    pub pending: Vec<MediaDescriptor>,
}

/// Per-conversation playback state machine
pub struct Scheduler {
    registry: Arc<ChatQueueRegistry>,
    transport: Arc<dyn MediaTransport>,
}

impl Scheduler {
    /// Create a scheduler over a registry and a transport
    #[must_use]
    pub fn new(registry: Arc<ChatQueueRegistry>, transport: Arc<dyn MediaTransport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Queue registry backing this scheduler
    #[must_use]
    pub fn registry(&self) -> &Arc<ChatQueueRegistry> {
        &self.registry
    }

    /// Start `media` right away if the conversation is idle, queue it otherwise.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::Transport` if the idle conversation's session
    /// could not be started; the media file is released in that case.
    pub async fn enqueue_and_maybe_start(
        &self,
        chat_id: i64,
        media: MediaDescriptor,
    ) -> Result<EnqueueOutcome, PlaybackError> {
        let handle = self.registry.get_or_create(&chat_id).await;
        let mut queue = handle.lock().await;

        match queue.state() {
            PlaybackState::Playing | PlaybackState::Paused => {
                let position = queue.push(media);
                info!(chat_id, position, "Added to queue");
                Ok(EnqueueOutcome::Queued { position })
            }
            PlaybackState::Idle | PlaybackState::Stopping => {
                if let Err(e) = self.transport.start_session(chat_id, media.file()).await {
                    warn!(chat_id, error = %e, "Failed to start session");
                    media::release(&media).await;
                    return Err(e.into());
                }
                info!(chat_id, title = %media.title(), "Playing now");
                queue.set_now_playing(Some(media));
                Ok(EnqueueOutcome::PlayingNow)
            }
        }
    }

    /// Move to the next pending item, or end the session when none is left.
    ///
    /// Items whose stream fails to start are dropped and the next one is
    /// tried, so this always ends `Started` or `Finished`.
    pub async fn advance(&self, chat_id: i64) -> AdvanceOutcome {
        let handle = self.registry.get_or_create(&chat_id).await;
        let mut queue = handle.lock().await;
        self.advance_locked(chat_id, &mut queue).await
    }

    /// User-issued skip.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NothingPlaying` when the queue is empty.
    pub async fn skip(&self, chat_id: i64) -> Result<AdvanceOutcome, PlaybackError> {
        let handle = self.registry.get_or_create(&chat_id).await;
        let mut queue = handle.lock().await;
        if queue.is_empty() {
            return Err(PlaybackError::NothingPlaying);
        }
        Ok(self.advance_locked(chat_id, &mut queue).await)
    }

    /// Handle a stream-ended notification from the transport.
    ///
    /// Returns `None` for stale notifications (nothing was playing).
    pub async fn on_stream_ended(&self, chat_id: i64) -> Option<AdvanceOutcome> {
        let handle = self.registry.get_or_create(&chat_id).await;
        let mut queue = handle.lock().await;
        if queue.now_playing().is_none() {
            debug!(chat_id, "Ignoring stream-ended for idle conversation");
            return None;
        }
        Some(self.advance_locked(chat_id, &mut queue).await)
    }

    /// Suspend playback.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless playing, `Transport` if the transport refuses.
    pub async fn pause(&self, chat_id: i64) -> Result<(), PlaybackError> {
        let handle = self.registry.get_or_create(&chat_id).await;
        let mut queue = handle.lock().await;
        let state = queue.state();
        if state != PlaybackState::Playing {
            return Err(PlaybackError::InvalidState {
                operation: "pause",
                state,
            });
        }
        self.transport.pause_session(chat_id).await?;
        queue.set_paused(true);
        info!(chat_id, "Paused");
        Ok(())
    }

    /// Resume suspended playback.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless paused, `Transport` if the transport refuses.
    pub async fn resume(&self, chat_id: i64) -> Result<(), PlaybackError> {
        let handle = self.registry.get_or_create(&chat_id).await;
        let mut queue = handle.lock().await;
        let state = queue.state();
        if state != PlaybackState::Paused {
            return Err(PlaybackError::InvalidState {
                operation: "resume",
                state,
            });
        }
        self.transport.resume_session(chat_id).await?;
        queue.set_paused(false);
        info!(chat_id, "Resumed");
        Ok(())
    }

    /// Leave the session and clear the queue, from any state.
    ///
    /// The queue is cleared even when the transport reports an error, since
    /// a failed leave means the session is already gone or unusable.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::Transport` if leaving the session failed.
    pub async fn stop(&self, chat_id: i64) -> Result<(), PlaybackError> {
        let handle = self.registry.get_or_create(&chat_id).await;
        let mut queue = handle.lock().await;
        queue.begin_stop();

        let result = self.transport.end_session(chat_id).await;
        let removed = queue.clear();
        info!(chat_id, cleared = removed.len(), "Stopped");
        for item in &removed {
            media::release(item).await;
        }

        result.map_err(PlaybackError::from)
    }

    /// Copy of the conversation's queue for display
    pub async fn snapshot(&self, chat_id: i64) -> QueueSnapshot {
        let Some(handle) = self.registry.get(&chat_id).await else {
            return QueueSnapshot::default();
        };
        let queue = handle.lock().await;
        QueueSnapshot {
            state: queue.state(),
            now_playing: queue.now_playing().cloned(),
            pending: queue.pending().cloned().collect(),
        }
    }

    /// Consume transport events until the channel closes.
    ///
    /// Each event runs in its own task so a slow stream start in one
    /// conversation does not hold up the others.
    pub async fn run_events(self: Arc<Self>, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::StreamEnded(chat_id) => {
                    let scheduler = self.clone();
                    tokio::spawn(async move {
                        if let Some(outcome) = scheduler.on_stream_ended(chat_id).await {
                            debug!(chat_id, ?outcome, "Auto-advanced");
                        }
                    });
                }
            }
        }
        debug!("Transport event channel closed");
    }

    // Bounded loop: each iteration consumes one pending item
    async fn advance_locked(&self, chat_id: i64, queue: &mut ConversationQueue) -> AdvanceOutcome {
        if let Some(finished) = queue.take_now_playing() {
            media::release(&finished).await;
        }

        while let Some(next) = queue.pop_next() {
            match self.transport.start_session(chat_id, next.file()).await {
                Ok(()) => {
                    info!(chat_id, title = %next.title(), "Playing next");
                    queue.set_now_playing(Some(next.clone()));
                    return AdvanceOutcome::Started(next);
                }
                Err(e) => {
                    warn!(chat_id, error = %e, title = %next.title(), "Play error, skipping item");
                    media::release(&next).await;
                }
            }
        }

        if let Err(e) = self.transport.end_session(chat_id).await {
            warn!(chat_id, error = %e, "Leaving empty session failed");
        }
        info!(chat_id, "Queue finished");
        AdvanceOutcome::Finished
    }
}
