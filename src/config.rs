//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the tunable constants of the bot.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Directory for downloaded media files
    #[serde(default = "default_download_directory")]
    pub download_directory: PathBuf,

    /// Longest track accepted by `/download` (seconds)
    #[serde(default = "default_max_duration_seconds")]
    pub max_duration_seconds: u32,

    /// Maximum number of strategies tried per resolve call
    #[serde(default = "default_retry_budget")]
    pub retry_budget: usize,

    /// Upper bound for a single acquisition attempt (seconds)
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// One backoff time unit between attempts (milliseconds)
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,

    /// Path or name of the yt-dlp executable
    #[serde(default = "default_ytdlp_binary")]
    pub ytdlp_binary: String,

    /// Netscape-format cookie text for YouTube
    pub youtube_cookies: Option<String>,

    /// Base URL of the voice-call bridge
    #[serde(default = "default_voice_bridge_url")]
    pub voice_bridge_url: String,

    /// Poll interval for bridge events (milliseconds)
    #[serde(default = "default_bridge_poll_interval_ms")]
    pub bridge_poll_interval_ms: u64,
}

fn default_download_directory() -> PathBuf {
    PathBuf::from("downloads")
}

const fn default_max_duration_seconds() -> u32 {
    DEFAULT_MAX_DURATION_SECS
}

const fn default_retry_budget() -> usize {
    DEFAULT_RETRY_BUDGET
}

const fn default_attempt_timeout_secs() -> u64 {
    DEFAULT_ATTEMPT_TIMEOUT_SECS
}

const fn default_backoff_unit_ms() -> u64 {
    DEFAULT_BACKOFF_UNIT_MS
}

fn default_ytdlp_binary() -> String {
    "yt-dlp".to_string()
}

fn default_voice_bridge_url() -> String {
    "http://127.0.0.1:8090".to_string()
}

const fn default_bridge_poll_interval_ms() -> u64 {
    1000
}

/// Subset of settings consumed by the acquisition pipeline
#[derive(Debug, Clone)]
pub struct AcquisitionSettings {
    /// Maximum number of strategies tried per resolve call
    pub retry_budget: usize,
    /// Upper bound for a single attempt
    pub attempt_timeout: Duration,
    /// One backoff time unit
    pub backoff_unit: Duration,
    /// Cookie text written to a scoped credentials file, if any
    pub cookies: Option<String>,
    /// Where the scoped credentials file is created
    pub credentials_dir: PathBuf,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            retry_budget: DEFAULT_RETRY_BUDGET,
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            backoff_unit: Duration::from_millis(DEFAULT_BACKOFF_UNIT_MS),
            cookies: None,
            credentials_dir: std::env::temp_dir(),
        }
    }
}

/// Build the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be read.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP__RETRY_BUDGET=2 ./target/oxide-music`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // UPPER_SNAKE_CASE env vars map to snake_case keys; empty ones count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or the token is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let mut settings: Self = build_config()?.try_deserialize()?;

        if settings.youtube_cookies.is_none() {
            if let Ok(val) = std::env::var("YOUTUBE_COOKIES") {
                if !val.trim().is_empty() {
                    settings.youtube_cookies = Some(val);
                }
            }
        }

        if settings.retry_budget == 0 {
            return Err(ConfigError::Message(
                "retry_budget must be at least 1".to_string(),
            ));
        }

        Ok(settings)
    }

    /// Settings for the acquisition pipeline
    #[must_use]
    pub fn acquisition(&self) -> AcquisitionSettings {
        AcquisitionSettings {
            retry_budget: self.retry_budget,
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
            backoff_unit: Duration::from_millis(self.backoff_unit_ms),
            cookies: self.youtube_cookies.clone(),
            credentials_dir: std::env::temp_dir(),
        }
    }

    /// Poll interval for bridge events
    #[must_use]
    pub const fn bridge_poll_interval(&self) -> Duration {
        Duration::from_millis(self.bridge_poll_interval_ms)
    }
}

/// Default longest track for `/download` (10 minutes)
pub const DEFAULT_MAX_DURATION_SECS: u32 = 600;
/// Default number of strategies tried per resolve call
pub const DEFAULT_RETRY_BUDGET: usize = 3;
/// Default per-attempt timeout
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 60;
/// Default backoff unit (2s, so waits are 2s, 4s, ...)
pub const DEFAULT_BACKOFF_UNIT_MS: u64 = 2000;

/// yt-dlp network socket timeout (seconds)
pub const YTDLP_SOCKET_TIMEOUT_SECS: u64 = 30;
/// yt-dlp internal retries for requests and fragments
pub const YTDLP_INTERNAL_RETRIES: u32 = 5;

// Telegram API retry configuration
/// Initial backoff for Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff for Telegram API retries
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Maximum attempts for Telegram API operations
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

/// Timeout for voice bridge HTTP requests
pub const BRIDGE_HTTP_TIMEOUT_SECS: u64 = 15;
/// How often empty, idle conversation queues are dropped
pub const QUEUE_PRUNE_INTERVAL_SECS: u64 = 600;
