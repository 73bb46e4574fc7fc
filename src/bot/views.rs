//! Reply texts for the music commands.
//!
//! Everything here is Telegram HTML. User-controlled text (queries, titles,
//! names) goes through `html_escape` before it is interpolated.

use crate::acquisition::AcquisitionError;
use crate::delivery::DeliveryError;
use crate::media::MediaDescriptor;
use crate::playback::{AdvanceOutcome, PlaybackError, QueueSnapshot, TransportError};
use crate::queue::PlaybackState;
use crate::utils::format_duration;
use html_escape::encode_text;

/// Welcome message for `/start`
pub const WELCOME: &str = "🎵 <b>Welcome to Music Bot!</b>\n\n\
    I can play music in voice chats or send it to you as MP3.\n\n\
    <b>Voice chat:</b>\n\
    • <code>/play &lt;song&gt;</code> - play or queue a song\n\
    • <code>/pause</code>, <code>/resume</code>, <code>/skip</code>, <code>/stop</code>\n\
    • <code>/queue</code>, <code>/current</code>\n\n\
    <b>Download:</b>\n\
    • <code>/download &lt;song&gt;</code> - get an MP3 file\n\n\
    🎧 <b>Example:</b> <code>/play perfect ed sheeran</code>";

/// Command reference for `/help`
pub const HELP: &str = "📚 <b>Music Bot Commands</b>\n\n\
    <b>🎵 Voice chat:</b>\n\
    • <code>/play &lt;song&gt;</code> - play song in the voice chat\n\
    • <code>/pause</code> - pause music\n\
    • <code>/resume</code> - resume music\n\
    • <code>/skip</code> - skip to the next song\n\
    • <code>/stop</code> - stop and leave the voice chat\n\
    • <code>/queue</code> - view the queue\n\
    • <code>/current</code> - now playing\n\n\
    <b>⬇️ Download:</b>\n\
    • <code>/download &lt;song&gt;</code> - get an MP3 file\n\n\
    <b>💡 Tips:</b>\n\
    • Add me to the group and make me admin\n\
    • Start a voice chat first\n\
    • Queue as many songs as you like";

/// About text for `/about`
pub const ABOUT: &str = "ℹ️ <b>About Music Bot</b>\n\n\
    Streams YouTube audio into Telegram voice chats with a per-chat queue, \
    and sends tracks as MP3 files on request.\n\n\
    ⚠️ For personal use only. Respect copyright laws.";

/// Reply for `/play` without a query
pub const PLAY_USAGE: &str = "❌ <b>Usage:</b> <code>/play &lt;song name&gt;</code>\n\n\
    <b>Example:</b> <code>/play perfect ed sheeran</code>";

/// Reply for `/download` without a query
pub const DOWNLOAD_USAGE: &str = "❌ <b>Usage:</b> <code>/download &lt;song name&gt;</code>\n\n\
    <b>Example:</b> <code>/download perfect ed sheeran</code>";

/// Reply when pause succeeded
pub const PAUSED: &str = "⏸ <b>Paused!</b>";
/// Reply when resume succeeded
pub const RESUMED: &str = "▶️ <b>Resumed!</b>";
/// Reply when stop succeeded
pub const STOPPED: &str = "⏹ <b>Stopped!</b> Left voice chat.";
/// Reply for queue inspection with nothing queued
pub const QUEUE_EMPTY: &str = "📭 <b>Queue is empty!</b>";
/// Reply when nothing is playing
pub const NOTHING_PLAYING: &str = "❌ <b>Nothing is playing!</b>";
/// Status shown after a successful `/download`
pub const DOWNLOAD_COMPLETE: &str = "✅ <b>Download complete!</b>";

/// Status shown while the pipeline runs
#[must_use]
pub fn searching(query: &str) -> String {
    format!("🔍 <b>Searching:</b> <code>{}</code>...", encode_text(query))
}

/// Reply after a track started streaming right away
#[must_use]
pub fn now_playing(media: &MediaDescriptor) -> String {
    format!(
        "🎵 <b>Now Playing</b>\n\n\
         <b>Title:</b> {}\n\
         <b>Duration:</b> {}\n\
         <b>Requested by:</b> {}",
        encode_text(media.title()),
        format_duration(media.duration_secs()),
        encode_text(media.requested_by())
    )
}

/// Reply after a track was added behind the current one
#[must_use]
pub fn queued(media: &MediaDescriptor, position: usize) -> String {
    format!(
        "✅ <b>Added to queue!</b>\n\n\
         🎵 <b>Title:</b> {}\n\
         ⏱ <b>Duration:</b> {}\n\
         📝 <b>Position:</b> {position}\n\
         👤 <b>Requested by:</b> {}",
        encode_text(media.title()),
        format_duration(media.duration_secs()),
        encode_text(media.requested_by())
    )
}

/// Reply for a failed resolve call.
///
/// An empty search gets query tips; anything else points at YouTube
/// blocking or erroring, since those are not fixed by rephrasing.
#[must_use]
pub fn acquisition_failed(error: &AcquisitionError) -> String {
    match error {
        AcquisitionError::NoResults => "❌ <b>No results found!</b>\n\n\
            YouTube search returned no results for this query.\n\n\
            <b>Try these:</b>\n\
            • Add the artist name\n\
            • Be more specific\n\
            • Try a different song"
            .to_string(),
        AcquisitionError::Unknown(_) => "❌ <b>An error occurred!</b>\n\n\
            YouTube may be blocking downloads or the video is unavailable.\n\
            Try again later or with a different song."
            .to_string(),
    }
}

/// Reply for a failed playback command
#[must_use]
pub fn playback_failed(error: &PlaybackError) -> String {
    match error {
        PlaybackError::NothingPlaying => NOTHING_PLAYING.to_string(),
        PlaybackError::InvalidState {
            state: PlaybackState::Paused,
            ..
        } => "⏸ <b>Already paused.</b> Use <code>/resume</code>.".to_string(),
        PlaybackError::InvalidState {
            state: PlaybackState::Playing,
            ..
        } => "▶️ <b>Already playing.</b>".to_string(),
        PlaybackError::InvalidState { .. } => NOTHING_PLAYING.to_string(),
        PlaybackError::Transport(TransportError::NoSession) => {
            "❌ <b>No active voice chat!</b>\n\nStart a voice chat in this group first.".to_string()
        }
        PlaybackError::Transport(e) => {
            format!("❌ <b>Voice chat error:</b> {}", encode_text(&e.to_string()))
        }
    }
}

/// Reply after a user skip
#[must_use]
pub fn skipped(outcome: &AdvanceOutcome) -> String {
    match outcome {
        AdvanceOutcome::Started(next) => {
            format!("⏭ <b>Skipped!</b>\n\n{}", now_playing(next))
        }
        AdvanceOutcome::Finished => {
            "⏭ <b>Skipped!</b> Queue finished, left voice chat.".to_string()
        }
    }
}

/// `/queue` listing: the current track, then pending tracks by position
#[must_use]
pub fn queue_listing(snapshot: &QueueSnapshot) -> String {
    if snapshot.now_playing.is_none() && snapshot.pending.is_empty() {
        return QUEUE_EMPTY.to_string();
    }

    let mut text = String::from("📝 <b>Current Queue:</b>\n\n");
    if let Some(current) = &snapshot.now_playing {
        let marker = if snapshot.state == PlaybackState::Paused {
            "⏸"
        } else {
            "▶️"
        };
        text.push_str(&format!(
            "{marker} {}\n   ⏱ {} | 👤 {}\n\n",
            encode_text(current.title()),
            format_duration(current.duration_secs()),
            encode_text(current.requested_by())
        ));
    }
    for (i, item) in snapshot.pending.iter().enumerate() {
        text.push_str(&format!(
            "{}. {}\n   ⏱ {} | 👤 {}\n\n",
            i + 1,
            encode_text(item.title()),
            format_duration(item.duration_secs()),
            encode_text(item.requested_by())
        ));
    }
    text.trim_end().to_string()
}

/// `/current` reply
#[must_use]
pub fn current(snapshot: &QueueSnapshot) -> String {
    let Some(media) = &snapshot.now_playing else {
        return NOTHING_PLAYING.to_string();
    };
    let heading = if snapshot.state == PlaybackState::Paused {
        "⏸ <b>Paused</b>"
    } else {
        "🎵 <b>Currently playing...</b>"
    };
    format!(
        "{heading}\n\n\
         <b>Title:</b> {}\n\
         <b>Duration:</b> {}\n\
         <b>Requested by:</b> {}",
        encode_text(media.title()),
        format_duration(media.duration_secs()),
        encode_text(media.requested_by())
    )
}

/// Reply for a failed `/download`
#[must_use]
pub fn delivery_failed(error: &DeliveryError) -> String {
    match error {
        DeliveryError::Acquisition(e) => acquisition_failed(e),
        DeliveryError::TooLong { max_secs, .. } => format!(
            "❌ <b>Song too long!</b> (Max {})",
            format_duration(*max_secs)
        ),
        DeliveryError::Upload(_) => "❌ <b>Upload failed!</b>\n\n\
            Telegram did not accept the file. Try again later."
            .to_string(),
    }
}

/// Caption attached to a delivered MP3
#[must_use]
pub fn audio_caption(media: &MediaDescriptor) -> String {
    format!("🎵 {}", encode_text(media.title()))
}
