//! Resolved media descriptors
//!
//! A [`MediaDescriptor`] is the result of a successful acquisition. It is
//! immutable once built: it sits in a queue, plays, or gets discarded.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Best search match downloaded by the search/download collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Platform identifier of the content
    pub id: String,
    /// Display title
    pub title: String,
    /// Duration in seconds (0 when unknown)
    pub duration_secs: u32,
    /// Canonical page URL
    pub webpage_url: String,
    /// Thumbnail URL, if the platform reported one
    pub thumbnail: Option<String>,
    /// Local file written by the download
    pub file: PathBuf,
}

/// Playable media resolved from a user query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescriptor {
    file: PathBuf,
    title: String,
    duration_secs: u32,
    source_url: String,
    thumbnail: Option<String>,
    requested_by: String,
}

impl MediaDescriptor {
    /// Build a descriptor from its parts
    #[must_use]
    pub fn new(
        file: impl Into<PathBuf>,
        title: impl Into<String>,
        duration_secs: u32,
        source_url: impl Into<String>,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            title: title.into(),
            duration_secs,
            source_url: source_url.into(),
            thumbnail: None,
            requested_by: requested_by.into(),
        }
    }

    /// Build a descriptor from a downloaded candidate
    #[must_use]
    pub fn from_candidate(candidate: Candidate, requested_by: impl Into<String>) -> Self {
        Self {
            file: candidate.file,
            title: candidate.title,
            duration_secs: candidate.duration_secs,
            source_url: candidate.webpage_url,
            thumbnail: candidate.thumbnail,
            requested_by: requested_by.into(),
        }
    }

    /// Local file holding the playable content
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Display title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Duration in seconds, 0 when unknown
    #[must_use]
    pub const fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    /// Canonical origin URL
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Thumbnail URL
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    /// Display identity of the requester
    #[must_use]
    pub fn requested_by(&self) -> &str {
        &self.requested_by
    }
}

/// Delete the file behind a descriptor once nothing needs it anymore.
///
/// Failures are logged and swallowed.
pub async fn release(media: &MediaDescriptor) {
    remove_media_file(media.file()).await;
}

/// Delete a downloaded media file, logging instead of failing.
pub async fn remove_media_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(file = %path.display(), "Removed media file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(file = %path.display(), "Media file already gone");
        }
        Err(e) => warn!(error = %e, file = %path.display(), "Failed to remove media file"),
    }
}
