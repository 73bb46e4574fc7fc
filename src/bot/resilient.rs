//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! Status messages ("Searching...", "Uploading...") are sent once and then
//! edited in place. When an edit cannot be applied the caller falls back to
//! a fresh message.

use crate::utils::{retry_telegram_operation, truncate_str};
use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message, MessageId, ParseMode};
use tracing::{debug, warn};

/// Telegram caps messages at 4096 characters
const MAX_MESSAGE_CHARS: usize = 4000;

/// Send an HTML message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the last Telegram error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
) -> Result<Message> {
    let text = text.into();
    retry_telegram_operation(|| async {
        bot.send_message(chat_id, text.clone())
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit an HTML message with automatic retry.
///
/// `Ok(None)` means Telegram reported the message as not modified.
///
/// # Errors
///
/// Returns the last Telegram error after all retries are exhausted.
pub async fn edit_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: impl Into<String>,
) -> Result<Option<Message>> {
    let text = text.into();
    retry_telegram_operation(|| async {
        match bot
            .edit_message_text(chat_id, msg_id, text.clone())
            .parse_mode(ParseMode::Html)
            .await
        {
            Ok(msg) => Ok(Some(msg)),
            Err(e) => {
                if e.to_string().contains("message is not modified") {
                    return Ok(None);
                }
                Err(anyhow::anyhow!("Telegram edit error: {e}"))
            }
        }
    })
    .await
}

/// Replace the text of a status message, or send a new one if that fails.
///
/// Never returns an error; delivery problems are logged.
pub async fn update_status(bot: &Bot, status: &Message, text: &str) {
    let text = fit_message(text);
    match edit_message_resilient(bot, status.chat.id, status.id, text.clone()).await {
        Ok(Some(_)) => {}
        Ok(None) => debug!("Status update skipped: message is not modified"),
        Err(e) => {
            debug!(error = %e, "Status edit failed, sending a new message");
            if let Err(e) = send_message_resilient(bot, status.chat.id, text).await {
                warn!(error = %e, "Failed to send status message after retries");
            }
        }
    }
}

/// Send a reply, logging instead of failing
pub async fn reply(bot: &Bot, chat_id: ChatId, text: &str) {
    if let Err(e) = send_message_resilient(bot, chat_id, fit_message(text)).await {
        warn!(chat_id = chat_id.0, error = %e, "Failed to send reply after retries");
    }
}

fn fit_message(text: &str) -> String {
    if text.chars().count() > MAX_MESSAGE_CHARS {
        format!(
            "{}...\n\n<i>(message truncated)</i>",
            truncate_str(text, MAX_MESSAGE_CHARS)
        )
    } else {
        text.to_string()
    }
}
