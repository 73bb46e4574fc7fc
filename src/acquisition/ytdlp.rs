//! yt-dlp search/download collaborator
//!
//! Runs `yt-dlp` as a child process, asks it for the single best search
//! match and parses the JSON it prints after downloading. Every attempt
//! writes under its own nonce; whatever an unsuccessful attempt left in the
//! download directory is removed before the next one starts.

use super::strategy::Strategy;
use super::{DownloadError, MediaDownloader};
use crate::config::{YTDLP_INTERNAL_RETRIES, YTDLP_SOCKET_TIMEOUT_SECS};
use crate::media::Candidate;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

/// Longest stderr excerpt carried in an error
const MAX_ERROR_LENGTH: usize = 1000;

/// Downloader backed by the yt-dlp executable
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    binary: String,
    download_dir: PathBuf,
}

impl YtDlpDownloader {
    /// Create a downloader writing into `download_dir`
    #[must_use]
    pub fn new(binary: impl Into<String>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            download_dir: download_dir.into(),
        }
    }

    /// Build the argument list for one attempt.
    ///
    /// Output files are named `<id>-<nonce>.<ext>`; the nonce keeps two
    /// downloads of the same video from sharing a file.
    #[must_use]
    pub fn build_args(
        &self,
        query: &str,
        strategy: &Strategy,
        credentials: Option<&Path>,
        nonce: &str,
    ) -> Vec<String> {
        let template = self
            .download_dir
            .join(format!("%(id)s-{nonce}.%(ext)s"))
            .to_string_lossy()
            .into_owned();

        let mut args = vec![
            "--dump-single-json".to_string(),
            "--no-simulate".to_string(),
            "--no-progress".to_string(),
            "--no-warnings".to_string(),
            "--no-check-certificates".to_string(),
            "--geo-bypass".to_string(),
            "--socket-timeout".to_string(),
            YTDLP_SOCKET_TIMEOUT_SECS.to_string(),
            "--retries".to_string(),
            YTDLP_INTERNAL_RETRIES.to_string(),
            "--fragment-retries".to_string(),
            YTDLP_INTERNAL_RETRIES.to_string(),
            "--extractor-retries".to_string(),
            YTDLP_INTERNAL_RETRIES.to_string(),
            "--format".to_string(),
            strategy.format.to_string(),
            "--output".to_string(),
            template,
            "--extractor-args".to_string(),
            format!("youtube:player_client={}", strategy.client.player_client),
            "--add-header".to_string(),
            format!("User-Agent:{}", strategy.client.user_agent),
        ];

        if let Some(extract) = strategy.extract_audio {
            args.extend([
                "--extract-audio".to_string(),
                "--audio-format".to_string(),
                extract.codec.to_string(),
                "--audio-quality".to_string(),
                extract.quality.to_string(),
            ]);
        }

        if strategy.use_credentials {
            if let Some(path) = credentials {
                args.push("--cookies".to_string());
                args.push(path.to_string_lossy().into_owned());
            }
        }

        args.push(format!("ytsearch1:{query}"));
        args
    }
}

#[async_trait]
impl MediaDownloader for YtDlpDownloader {
    async fn search_and_download_best(
        &self,
        query: &str,
        strategy: &Strategy,
        credentials: Option<PathBuf>,
    ) -> Result<Option<Candidate>, DownloadError> {
        let nonce = Uuid::new_v4().as_simple().to_string();
        let args = self.build_args(query, strategy, credentials.as_deref(), &nonce);
        debug!(strategy = strategy.name, query = %query, "Executing yt-dlp");

        // Declared before the child so it drops after it on cancellation
        let files = AttemptFiles::new(&self.download_dir, &nonce);

        // kill_on_drop: a timed-out attempt must not leave yt-dlp running
        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&output.stdout).into_owned()
            } else {
                stderr.into_owned()
            };
            return Err(DownloadError::Tool(crate::utils::truncate_str(
                message.trim(),
                MAX_ERROR_LENGTH,
            )));
        }

        let candidate = parse_search_output(&output.stdout)?;
        if candidate.is_some() {
            files.keep();
        }
        Ok(candidate)
    }
}

/// Files written by one attempt, removed on drop unless kept
struct AttemptFiles {
    dir: PathBuf,
    marker: String,
    keep: bool,
}

impl AttemptFiles {
    fn new(dir: &Path, nonce: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            marker: format!("-{nonce}."),
            keep: false,
        }
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for AttemptFiles {
    fn drop(&mut self) {
        if !self.keep {
            remove_attempt_files(&self.dir, &self.marker);
        }
    }
}

/// Delete every file in `dir` whose name contains `marker`, including
/// `.part` and pre-conversion leftovers. Returns how many were removed.
fn remove_attempt_files(dir: &Path, marker: &str) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().contains(marker) {
            continue;
        }
        let path = entry.path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Removed leftover download");
                removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, path = %path.display(), "Failed to remove leftover download"),
        }
    }
    removed
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    entries: Vec<Option<Entry>>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    title: String,
    duration: Option<f64>,
    webpage_url: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    requested_downloads: Vec<RequestedDownload>,
    #[serde(rename = "_filename")]
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RequestedDownload {
    filepath: Option<String>,
}

/// Parse the `--dump-single-json` output of a `ytsearch1:` query.
///
/// Returns `Ok(None)` when the search produced no entries.
///
/// # Errors
///
/// Returns `DownloadError::Json` on malformed output and
/// `DownloadError::Tool` when an entry carries no downloaded file.
pub fn parse_search_output(stdout: &[u8]) -> Result<Option<Candidate>, DownloadError> {
    let result: SearchResult = serde_json::from_slice(stdout)?;
    let Some(entry) = result.entries.into_iter().flatten().next() else {
        return Ok(None);
    };

    // requested_downloads reflects the path after post-processing (e.g. mp3)
    let file = entry
        .requested_downloads
        .iter()
        .find_map(|d| d.filepath.clone())
        .or(entry.filename)
        .ok_or_else(|| {
            DownloadError::Tool(format!("yt-dlp reported no file for '{}'", entry.title))
        })?;

    let webpage_url = entry
        .webpage_url
        .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", entry.id));

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let duration_secs = entry
        .duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .map_or(0, |d| d.round() as u32);

    Ok(Some(Candidate {
        id: entry.id,
        title: entry.title,
        duration_secs,
        webpage_url,
        thumbnail: entry.thumbnail,
        file: PathBuf::from(file),
    }))
}
