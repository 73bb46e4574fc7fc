#![deny(missing_docs)]
//! Oxide Music library.
//!
//! Voice-chat music bot core: query acquisition through yt-dlp with
//! fallback strategies, per-chat playback queues and the scheduler that
//! drives the voice bridge.

/// Media acquisition pipeline (search, download, fallback strategies).
pub mod acquisition;
/// Telegram command handlers and reply views.
pub mod bot;
/// Configuration management.
pub mod config;
/// Download-for-file-delivery path.
pub mod delivery;
/// Resolved media descriptors.
pub mod media;
/// Playback scheduler and media transport.
pub mod playback;
/// Per-conversation queues.
pub mod queue;
/// Utility functions.
pub mod utils;
