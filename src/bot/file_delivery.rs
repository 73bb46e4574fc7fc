//! Telegram upload of downloaded tracks.

use super::views;
use crate::delivery::FileDelivery;
use crate::media::MediaDescriptor;
use crate::utils::retry_telegram_operation;
use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, ParseMode};

/// Sends MP3 files with `sendAudio`
#[derive(Clone)]
pub struct TelegramDelivery {
    bot: Bot,
}

impl TelegramDelivery {
    /// Create a delivery collaborator for `bot`
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl FileDelivery for TelegramDelivery {
    async fn send_audio(&self, chat_id: i64, media: &MediaDescriptor) -> Result<()> {
        let caption = views::audio_caption(media);
        retry_telegram_operation(|| async {
            self.bot
                .send_audio(ChatId(chat_id), InputFile::file(media.file().to_path_buf()))
                .title(media.title().to_string())
                .caption(caption.clone())
                .parse_mode(ParseMode::Html)
                .await
                .map(|_| ())
                .map_err(|e| anyhow::anyhow!("Telegram upload error: {e}"))
        })
        .await
    }
}
