//! Media acquisition pipeline
//!
//! Resolves a free-text query into a downloaded [`MediaDescriptor`] by
//! walking an ordered list of [`Strategy`] variants with exponential backoff
//! between attempts. Strategy-level failures are absorbed here; only one
//! terminal outcome crosses the pipeline boundary.

/// Failure classification
pub mod classify;
/// Scoped credentials file
pub mod credentials;
/// Static strategy tables
pub mod strategy;
/// yt-dlp collaborator
pub mod ytdlp;

pub use classify::{ErrorClassifier, FailureClass, PatternClassifier};
pub use strategy::{Strategy, DELIVERY_STRATEGIES, PLAYBACK_STRATEGIES};
pub use ytdlp::YtDlpDownloader;

use crate::config::AcquisitionSettings;
use crate::media::{Candidate, MediaDescriptor};
use async_trait::async_trait;
use credentials::CredentialsFile;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Terminal outcome of a failed resolve call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquisitionError {
    /// Every attempt came back without search results
    #[error("no results found")]
    NoResults,
    /// Strategies exhausted on errors; carries the last diagnostic
    #[error("acquisition failed: {0}")]
    Unknown(String),
}

/// Failure reported by the search/download collaborator for one attempt
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The tool ran and reported an error
    #[error("{0}")]
    Tool(String),
    /// The tool could not be started or its I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The tool output could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Search/download collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Search for `query` and download the single best match.
    ///
    /// Returns `Ok(None)` when the search produced no candidates.
    async fn search_and_download_best(
        &self,
        query: &str,
        strategy: &Strategy,
        credentials: Option<PathBuf>,
    ) -> Result<Option<Candidate>, DownloadError>;
}

/// Result of one strategy attempt that did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Search returned no candidates
    Empty,
    /// Attempt failed with a classified error
    Failed {
        /// Classifier verdict
        class: FailureClass,
        /// Diagnostic text
        message: String,
    },
}

/// Transient record of one attempt, alive for a single resolve call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionAttempt {
    /// Position of the strategy in the list
    pub strategy_index: usize,
    /// What went wrong
    pub outcome: AttemptOutcome,
}

impl AcquisitionAttempt {
    fn into_error(self) -> AcquisitionError {
        match self.outcome {
            AttemptOutcome::Empty => AcquisitionError::NoResults,
            AttemptOutcome::Failed { message, .. } => AcquisitionError::Unknown(message),
        }
    }
}

/// Wait before attempt `attempt` (1-based): nothing for the first, then
/// `2^(attempt-2)` units, i.e. 1, 2, 4... units.
#[must_use]
pub fn backoff_delay(unit: Duration, attempt: usize) -> Duration {
    if attempt <= 1 {
        return Duration::ZERO;
    }
    let exponent = u32::try_from(attempt - 2).unwrap_or(u32::MAX).min(16);
    unit.saturating_mul(1 << exponent)
}

/// Ordered-fallback resolver over a search/download collaborator
pub struct AcquisitionPipeline {
    downloader: Arc<dyn MediaDownloader>,
    classifier: Arc<dyn ErrorClassifier>,
    strategies: &'static [Strategy],
    settings: AcquisitionSettings,
}

impl AcquisitionPipeline {
    /// Create a pipeline with the default pattern classifier
    #[must_use]
    pub fn new(
        downloader: Arc<dyn MediaDownloader>,
        strategies: &'static [Strategy],
        settings: AcquisitionSettings,
    ) -> Self {
        Self {
            downloader,
            classifier: Arc::new(PatternClassifier::default()),
            strategies,
            settings,
        }
    }

    /// Replace the failure classifier
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Strategies this pipeline will try, after applying the retry budget
    #[must_use]
    pub fn active_strategies(&self) -> &'static [Strategy] {
        let budget = self.settings.retry_budget.max(1);
        &self.strategies[..self.strategies.len().min(budget)]
    }

    /// Resolve a query into playable media.
    ///
    /// `query` must be non-empty after trimming; callers reject empty input.
    ///
    /// # Errors
    ///
    /// Returns `AcquisitionError::NoResults` when the last attempt found
    /// nothing, `AcquisitionError::Unknown` when it failed with an error.
    pub async fn resolve(
        &self,
        query: &str,
        requested_by: &str,
    ) -> Result<MediaDescriptor, AcquisitionError> {
        info!(query = %query, "Resolving query");

        // Held until return; dropping it deletes the file on every path
        let credentials = self.create_credentials().await;
        let credentials_path = credentials.as_ref().map(|c| c.path().to_path_buf());

        let strategies = self.active_strategies();
        let mut last_failure: Option<AcquisitionAttempt> = None;

        for (index, strategy) in strategies.iter().enumerate() {
            let attempt = index + 1;
            if attempt > 1 {
                let wait = backoff_delay(self.settings.backoff_unit, attempt);
                info!(attempt, wait_ms = wait.as_millis(), "Waiting before retry");
                tokio::time::sleep(wait).await;
            }

            info!(attempt, strategy = strategy.name, "Trying strategy");
            let strategy_credentials = credentials_path
                .as_ref()
                .filter(|_| strategy.use_credentials)
                .cloned();
            let outcome = tokio::time::timeout(
                self.settings.attempt_timeout,
                self.downloader
                    .search_and_download_best(query, strategy, strategy_credentials),
            )
            .await;

            let failed = match outcome {
                Ok(Ok(Some(candidate))) => {
                    info!(attempt, strategy = strategy.name, title = %candidate.title, "Downloaded");
                    return Ok(MediaDescriptor::from_candidate(candidate, requested_by));
                }
                Ok(Ok(None)) => {
                    warn!(attempt, strategy = strategy.name, "Search returned 0 results");
                    AttemptOutcome::Empty
                }
                Ok(Err(e)) => {
                    let message = e.to_string();
                    let class = self.classifier.classify(&message);
                    log_failure(attempt, strategy, class, &message);
                    AttemptOutcome::Failed { class, message }
                }
                Err(_) => {
                    let message = format!(
                        "attempt timed out after {}s",
                        self.settings.attempt_timeout.as_secs()
                    );
                    warn!(attempt, strategy = strategy.name, "Attempt timed out");
                    AttemptOutcome::Failed {
                        class: FailureClass::Unclassified,
                        message,
                    }
                }
            };

            last_failure = Some(AcquisitionAttempt {
                strategy_index: index,
                outcome: failed,
            });
        }

        warn!(query = %query, attempts = strategies.len(), "All strategies failed");
        Err(last_failure.map_or_else(
            || AcquisitionError::Unknown("no strategies configured".to_string()),
            AcquisitionAttempt::into_error,
        ))
    }

    async fn create_credentials(&self) -> Option<CredentialsFile> {
        let cookies = self.settings.cookies.as_deref()?;
        match CredentialsFile::create(&self.settings.credentials_dir, cookies).await {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(error = %e, "Failed to write credentials file, continuing without");
                None
            }
        }
    }
}

fn log_failure(attempt: usize, strategy: &Strategy, class: FailureClass, message: &str) {
    let excerpt = crate::utils::truncate_str(message, 300);
    match class {
        FailureClass::AccessBlocked => {
            warn!(attempt, strategy = strategy.name, error = %excerpt, "Access blocked, trying next strategy");
        }
        FailureClass::ContentUnavailable => {
            warn!(attempt, strategy = strategy.name, error = %excerpt, "Content unavailable");
        }
        FailureClass::Unclassified => {
            warn!(attempt, strategy = strategy.name, error = %excerpt, "Unhandled error");
        }
    }
    debug!(attempt, full_error = %message, "Attempt failure detail");
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::always;
    use mockall::Sequence;

    fn settings() -> AcquisitionSettings {
        AcquisitionSettings {
            backoff_unit: Duration::from_millis(100),
            ..AcquisitionSettings::default()
        }
    }

    fn candidate(id: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            title: format!("Title {id}"),
            duration_secs: 200,
            webpage_url: format!("https://www.youtube.com/watch?v={id}"),
            thumbnail: None,
            file: PathBuf::from(format!("downloads/{id}.m4a")),
        }
    }

    #[test]
    fn test_backoff_doubles_each_attempt() {
        let unit = Duration::from_secs(2);
        assert_eq!(backoff_delay(unit, 1), Duration::ZERO);
        assert_eq!(backoff_delay(unit, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(unit, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(unit, 4), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_strategy_skips_backoff() {
        let mut downloader = MockMediaDownloader::new();
        downloader
            .expect_search_and_download_best()
            .times(1)
            .returning(|_, _, _| Ok(Some(candidate("a"))));

        let pipeline =
            AcquisitionPipeline::new(Arc::new(downloader), PLAYBACK_STRATEGIES, settings());
        let start = tokio::time::Instant::now();
        let media = pipeline.resolve("song", "@bob").await.expect("resolved");

        assert_eq!(media.title(), "Title a");
        assert_eq!(media.requested_by(), "@bob");
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_everywhere_is_no_results() {
        let mut downloader = MockMediaDownloader::new();
        downloader
            .expect_search_and_download_best()
            .times(3)
            .returning(|_, _, _| Ok(None));

        let pipeline =
            AcquisitionPipeline::new(Arc::new(downloader), PLAYBACK_STRATEGIES, settings());
        assert_eq!(
            pipeline.resolve("zzzz", "@bob").await,
            Err(AcquisitionError::NoResults)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_unclassified_error_is_reported() {
        let mut seq = Sequence::new();
        let mut downloader = MockMediaDownloader::new();
        downloader
            .expect_search_and_download_best()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(None));
        downloader
            .expect_search_and_download_best()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(DownloadError::Tool("ffmpeg not found".to_string())));

        let pipeline =
            AcquisitionPipeline::new(Arc::new(downloader), PLAYBACK_STRATEGIES, settings());
        assert_eq!(
            pipeline.resolve("song", "@bob").await,
            Err(AcquisitionError::Unknown("ffmpeg not found".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_limits_attempts() {
        let mut downloader = MockMediaDownloader::new();
        downloader
            .expect_search_and_download_best()
            .with(always(), always(), always())
            .times(1)
            .returning(|_, _, _| Ok(None));

        let pipeline = AcquisitionPipeline::new(
            Arc::new(downloader),
            PLAYBACK_STRATEGIES,
            AcquisitionSettings {
                retry_budget: 1,
                ..settings()
            },
        );
        assert_eq!(pipeline.active_strategies().len(), 1);
        assert_eq!(
            pipeline.resolve("song", "@bob").await,
            Err(AcquisitionError::NoResults)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_attempt_times_out_and_moves_on() {
        struct HangThenSucceed;

        #[async_trait]
        impl MediaDownloader for HangThenSucceed {
            async fn search_and_download_best(
                &self,
                _query: &str,
                strategy: &Strategy,
                _credentials: Option<PathBuf>,
            ) -> Result<Option<Candidate>, DownloadError> {
                if strategy.name == "android" {
                    std::future::pending::<()>().await;
                }
                Ok(Some(candidate("late")))
            }
        }

        let pipeline = AcquisitionPipeline::new(
            Arc::new(HangThenSucceed),
            PLAYBACK_STRATEGIES,
            AcquisitionSettings {
                attempt_timeout: Duration::from_secs(30),
                ..settings()
            },
        );
        let media = pipeline.resolve("song", "@bob").await.expect("resolved");
        assert_eq!(media.title(), "Title late");
    }

    #[tokio::test(start_paused = true)]
    async fn test_credentials_passed_only_where_allowed_and_cleaned_up() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::<Option<PathBuf>>::new()));
        let seen_clone = seen.clone();

        let mut downloader = MockMediaDownloader::new();
        downloader
            .expect_search_and_download_best()
            .times(3)
            .returning(move |_, _, credentials| {
                if let Some(path) = &credentials {
                    assert!(path.exists(), "credentials file must exist during attempt");
                }
                seen_clone.lock().expect("lock").push(credentials);
                Err(DownloadError::Tool("Sign in to confirm you're not a bot".to_string()))
            });

        let pipeline = AcquisitionPipeline::new(
            Arc::new(downloader),
            PLAYBACK_STRATEGIES,
            AcquisitionSettings {
                cookies: Some("# Netscape HTTP Cookie File".to_string()),
                ..settings()
            },
        );
        let result = pipeline.resolve("song", "@bob").await;
        assert!(matches!(result, Err(AcquisitionError::Unknown(_))));

        let seen = seen.lock().expect("lock");
        assert_eq!(seen.len(), 3);
        assert!(seen[0].is_some());
        assert!(seen[1].is_none(), "ios strategy must not receive cookies");
        assert!(seen[2].is_some());
        for path in seen.iter().flatten() {
            assert!(!path.exists(), "credentials file must be removed after resolve");
        }
    }
}
