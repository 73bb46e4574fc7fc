//! Small helpers shared by the bot and the acquisition pipeline.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Safely truncates a string to a maximum character length (not bytes).
///
/// This is UTF-8 safe and will not panic on multi-byte characters.
///
/// # Examples
///
/// ```
/// use oxide_music::utils::truncate_str;
/// let s = "Привет, мир!";
/// assert_eq!(truncate_str(s, 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Formats a track length as `m:ss`, or `h:mm:ss` from one hour up.
///
/// # Examples
///
/// ```
/// use oxide_music::utils::format_duration;
/// assert_eq!(format_duration(263), "4:23");
/// assert_eq!(format_duration(3725), "1:02:05");
/// ```
#[must_use]
pub fn format_duration(total_secs: u32) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Retry a Telegram API operation with exponential backoff.
///
/// Used for uploads and status messages that may fail on transient network
/// errors. Delays start at 500ms, are capped at 4s and carry jitter; the
/// attempt count comes from `config.rs`.
///
/// # Errors
///
/// Returns the last error if every attempt fails.
///
/// # Examples
///
/// ```no_run
/// use oxide_music::utils::retry_telegram_operation;
/// use anyhow::Result;
///
/// async fn upload() -> Result<()> {
///     Ok(())
/// }
///
/// # async fn example() -> Result<()> {
/// retry_telegram_operation(|| async { upload().await }).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} attempts: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_truncate_str_unicode() {
        let s = "Привет, мир!";
        assert_eq!(truncate_str(s, 6), "Привет");
        assert_eq!(truncate_str(s, 50), "Привет, мир!");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(600), "10:00");
        assert_eq!(format_duration(3600), "1:00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result = retry_telegram_operation(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("connection reset");
                }
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.expect("retried"), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_with_last_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result: Result<()> = retry_telegram_operation(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("bad gateway")
            }
        })
        .await;

        assert!(result.is_err());
        // One initial attempt plus one per backoff step
        assert_eq!(
            calls.load(Ordering::SeqCst),
            crate::config::TELEGRAM_API_MAX_RETRIES + 1
        );
    }
}
