//! Media transport collaborator
//!
//! The voice-call side of playback: start, pause, resume and end a stream
//! for one conversation. Completion comes back as [`TransportEvent`]s.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors reported by the media transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No active session for the conversation
    #[error("no active voice session")]
    NoSession,
    /// The platform rejected the control operation
    #[error("transport rejected the request: {0}")]
    Rejected(String),
    /// The transport could not be reached
    #[error("transport network error: {0}")]
    Network(String),
}

/// Inbound notification from the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// The current stream finished or failed
    StreamEnded(i64),
}

/// Voice-call transport consumed by the scheduler
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Join (if needed) and stream `file` in the conversation's call
    async fn start_session(&self, chat_id: i64, file: &Path) -> Result<(), TransportError>;

    /// Suspend the current stream
    async fn pause_session(&self, chat_id: i64) -> Result<(), TransportError>;

    /// Resume a suspended stream
    async fn resume_session(&self, chat_id: i64) -> Result<(), TransportError>;

    /// Leave the call
    async fn end_session(&self, chat_id: i64) -> Result<(), TransportError>;
}
