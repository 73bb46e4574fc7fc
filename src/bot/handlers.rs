use super::resilient::{reply, send_message_resilient, update_status};
use super::views;
use crate::acquisition::AcquisitionPipeline;
use crate::delivery::Delivery;
use crate::playback::{EnqueueOutcome, Scheduler};
use crate::utils::truncate_str;
use anyhow::Result;
use std::sync::Arc;
use teloxide::{prelude::*, utils::command::BotCommands};
use tracing::{info, warn};

/// Name shown as "Requested by"
pub fn get_user_name(msg: &Message) -> String {
    if let Some(ref user) = msg.from {
        if let Some(ref username) = user.username {
            return format!("@{username}");
        }
        if !user.first_name.is_empty() {
            return user.first_name.clone();
        }
    }
    "Unknown".to_string()
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Command reference
    #[command(description = "Show all commands.")]
    Help,
    /// About text
    #[command(description = "About this bot.")]
    About,
    /// Play or queue a song in the voice chat
    #[command(description = "Play a song in the voice chat.")]
    Play(String),
    /// Pause playback
    #[command(description = "Pause playback.")]
    Pause,
    /// Resume playback
    #[command(description = "Resume playback.")]
    Resume,
    /// Skip the current song
    #[command(description = "Skip the current song.")]
    Skip,
    /// Stop and leave the voice chat
    #[command(description = "Stop and leave the voice chat.")]
    Stop,
    /// Show the queue
    #[command(description = "Show the queue.")]
    Queue,
    /// Show the current song
    #[command(description = "Show the current song.")]
    Current,
    /// Send a song as an MP3 file
    #[command(description = "Download a song as MP3.")]
    Download(String),
}

/// Static text commands: `/start`, `/help`, `/about`
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn static_text(bot: Bot, msg: Message, text: &'static str) -> Result<()> {
    send_message_resilient(&bot, msg.chat.id, text).await?;
    Ok(())
}

/// `/play <query>`: resolve, then start or queue
///
/// # Errors
///
/// Returns an error if the initial status message cannot be sent.
pub async fn play(
    bot: Bot,
    msg: Message,
    query: String,
    pipeline: Arc<AcquisitionPipeline>,
    scheduler: Arc<Scheduler>,
) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        reply(&bot, msg.chat.id, views::PLAY_USAGE).await;
        return Ok(());
    }

    let chat_id = msg.chat.id.0;
    let requested_by = get_user_name(&msg);
    info!(
        chat_id,
        user_id = get_user_id_safe(&msg),
        query = %truncate_str(query, 100),
        "Play requested"
    );

    let status = send_message_resilient(&bot, msg.chat.id, views::searching(query)).await?;

    let media = match pipeline.resolve(query, &requested_by).await {
        Ok(media) => media,
        Err(e) => {
            warn!(chat_id, error = %e, "Play resolve failed");
            update_status(&bot, &status, &views::acquisition_failed(&e)).await;
            return Ok(());
        }
    };

    let text = match scheduler.enqueue_and_maybe_start(chat_id, media.clone()).await {
        Ok(EnqueueOutcome::PlayingNow) => views::now_playing(&media),
        Ok(EnqueueOutcome::Queued { position }) => views::queued(&media, position),
        Err(e) => views::playback_failed(&e),
    };
    update_status(&bot, &status, &text).await;
    Ok(())
}

/// `/pause`
///
/// # Errors
///
/// Never fails; reply problems are logged.
pub async fn pause(bot: Bot, msg: Message, scheduler: Arc<Scheduler>) -> Result<()> {
    let text = match scheduler.pause(msg.chat.id.0).await {
        Ok(()) => views::PAUSED.to_string(),
        Err(e) => views::playback_failed(&e),
    };
    reply(&bot, msg.chat.id, &text).await;
    Ok(())
}

/// `/resume`
///
/// # Errors
///
/// Never fails; reply problems are logged.
pub async fn resume(bot: Bot, msg: Message, scheduler: Arc<Scheduler>) -> Result<()> {
    let text = match scheduler.resume(msg.chat.id.0).await {
        Ok(()) => views::RESUMED.to_string(),
        Err(e) => views::playback_failed(&e),
    };
    reply(&bot, msg.chat.id, &text).await;
    Ok(())
}

/// `/skip`
///
/// # Errors
///
/// Never fails; reply problems are logged.
pub async fn skip(bot: Bot, msg: Message, scheduler: Arc<Scheduler>) -> Result<()> {
    let text = match scheduler.skip(msg.chat.id.0).await {
        Ok(outcome) => views::skipped(&outcome),
        Err(e) => views::playback_failed(&e),
    };
    reply(&bot, msg.chat.id, &text).await;
    Ok(())
}

/// `/stop`
///
/// # Errors
///
/// Never fails; reply problems are logged.
pub async fn stop(bot: Bot, msg: Message, scheduler: Arc<Scheduler>) -> Result<()> {
    let text = match scheduler.stop(msg.chat.id.0).await {
        Ok(()) => views::STOPPED.to_string(),
        Err(e) => views::playback_failed(&e),
    };
    reply(&bot, msg.chat.id, &text).await;
    Ok(())
}

/// `/queue`
///
/// # Errors
///
/// Never fails; reply problems are logged.
pub async fn queue(bot: Bot, msg: Message, scheduler: Arc<Scheduler>) -> Result<()> {
    let snapshot = scheduler.snapshot(msg.chat.id.0).await;
    reply(&bot, msg.chat.id, &views::queue_listing(&snapshot)).await;
    Ok(())
}

/// `/current`
///
/// # Errors
///
/// Never fails; reply problems are logged.
pub async fn current(bot: Bot, msg: Message, scheduler: Arc<Scheduler>) -> Result<()> {
    let snapshot = scheduler.snapshot(msg.chat.id.0).await;
    reply(&bot, msg.chat.id, &views::current(&snapshot)).await;
    Ok(())
}

/// `/download <query>`: resolve as MP3 and upload to the chat
///
/// # Errors
///
/// Returns an error if the initial status message cannot be sent.
pub async fn download(
    bot: Bot,
    msg: Message,
    query: String,
    delivery: Arc<Delivery>,
) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        reply(&bot, msg.chat.id, views::DOWNLOAD_USAGE).await;
        return Ok(());
    }

    let chat_id = msg.chat.id.0;
    info!(
        chat_id,
        user_id = get_user_id_safe(&msg),
        query = %truncate_str(query, 100),
        "Download requested"
    );

    let status = send_message_resilient(&bot, msg.chat.id, views::searching(query)).await?;
    let text = match delivery.deliver(chat_id, query, &get_user_name(&msg)).await {
        Ok(_) => views::DOWNLOAD_COMPLETE.to_string(),
        Err(e) => {
            warn!(chat_id, error = %e, "Download failed");
            views::delivery_failed(&e)
        }
    };
    update_status(&bot, &status, &text).await;
    Ok(())
}
