//! Download-for-file-delivery path
//!
//! `/download` resolves a query through a pipeline built on the MP3
//! delivery strategies, enforces the duration cap and hands the file to a
//! [`FileDelivery`] collaborator. The downloaded file is removed on every
//! exit path once it exists.

use crate::acquisition::{AcquisitionError, AcquisitionPipeline};
use crate::media::{self, MediaDescriptor};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from the delivery path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Resolution failed
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    /// Track exceeds the configured maximum duration
    #[error("track is {duration_secs}s long, limit is {max_secs}s")]
    TooLong {
        /// Track duration
        duration_secs: u32,
        /// Configured limit
        max_secs: u32,
    },
    /// Upload to the chat failed
    #[error("upload failed: {0}")]
    Upload(String),
}

/// Collaborator that sends a local audio file to a chat
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileDelivery: Send + Sync {
    /// Upload `media` as an audio attachment
    async fn send_audio(&self, chat_id: i64, media: &MediaDescriptor) -> anyhow::Result<()>;
}

/// Resolves, checks and uploads tracks for `/download`
pub struct Delivery {
    pipeline: AcquisitionPipeline,
    deliverer: Arc<dyn FileDelivery>,
    max_duration_secs: u32,
}

impl Delivery {
    /// Create the delivery path
    #[must_use]
    pub fn new(
        pipeline: AcquisitionPipeline,
        deliverer: Arc<dyn FileDelivery>,
        max_duration_secs: u32,
    ) -> Self {
        Self {
            pipeline,
            deliverer,
            max_duration_secs,
        }
    }

    /// Resolve `query` and send the track to `chat_id` as a file.
    ///
    /// # Errors
    ///
    /// `Acquisition` when resolution fails, `TooLong` over the duration cap,
    /// `Upload` when the collaborator cannot send the file.
    pub async fn deliver(
        &self,
        chat_id: i64,
        query: &str,
        requested_by: &str,
    ) -> Result<MediaDescriptor, DeliveryError> {
        let media = self.pipeline.resolve(query, requested_by).await?;

        if media.duration_secs() > self.max_duration_secs {
            info!(
                chat_id,
                duration = media.duration_secs(),
                max = self.max_duration_secs,
                "Track too long for delivery"
            );
            media::release(&media).await;
            return Err(DeliveryError::TooLong {
                duration_secs: media.duration_secs(),
                max_secs: self.max_duration_secs,
            });
        }

        let result = self.deliverer.send_audio(chat_id, &media).await;
        media::release(&media).await;

        match result {
            Ok(()) => {
                info!(chat_id, title = %media.title(), "Delivered track");
                Ok(media)
            }
            Err(e) => {
                warn!(chat_id, error = %e, "Track upload failed");
                Err(DeliveryError::Upload(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{MockMediaDownloader, DELIVERY_STRATEGIES};
    use crate::config::AcquisitionSettings;
    use crate::media::Candidate;
    use std::path::PathBuf;

    async fn downloaded_file() -> PathBuf {
        let path = std::env::temp_dir().join(format!("delivery-{}.mp3", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"mp3").await.expect("write");
        path
    }

    fn pipeline_returning(file: PathBuf, duration_secs: u32) -> AcquisitionPipeline {
        let mut downloader = MockMediaDownloader::new();
        downloader
            .expect_search_and_download_best()
            .returning(move |_, _, _| {
                Ok(Some(Candidate {
                    id: "abc".to_string(),
                    title: "Perfect".to_string(),
                    duration_secs,
                    webpage_url: "https://www.youtube.com/watch?v=abc".to_string(),
                    thumbnail: None,
                    file: file.clone(),
                }))
            });
        AcquisitionPipeline::new(
            Arc::new(downloader),
            DELIVERY_STRATEGIES,
            AcquisitionSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_delivers_and_removes_file() {
        let file = downloaded_file().await;
        let mut deliverer = MockFileDelivery::new();
        deliverer
            .expect_send_audio()
            .withf(|chat, media| *chat == 10 && media.title() == "Perfect")
            .times(1)
            .returning(|_, _| Ok(()));

        let delivery = Delivery::new(pipeline_returning(file.clone(), 263), Arc::new(deliverer), 600);
        let media = delivery.deliver(10, "perfect", "@alice").await.expect("delivered");

        assert_eq!(media.title(), "Perfect");
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_rejects_long_track_without_upload() {
        let file = downloaded_file().await;
        let mut deliverer = MockFileDelivery::new();
        deliverer.expect_send_audio().never();

        let delivery = Delivery::new(pipeline_returning(file.clone(), 601), Arc::new(deliverer), 600);
        assert_eq!(
            delivery.deliver(10, "long mix", "@alice").await,
            Err(DeliveryError::TooLong {
                duration_secs: 601,
                max_secs: 600
            })
        );
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_upload_failure_still_removes_file() {
        let file = downloaded_file().await;
        let mut deliverer = MockFileDelivery::new();
        deliverer
            .expect_send_audio()
            .returning(|_, _| Err(anyhow::anyhow!("Request Entity Too Large")));

        let delivery = Delivery::new(pipeline_returning(file.clone(), 100), Arc::new(deliverer), 600);
        let result = delivery.deliver(10, "perfect", "@alice").await;

        assert!(matches!(result, Err(DeliveryError::Upload(_))));
        assert!(!file.exists());
    }
}
