//! Failure classification for the search/download collaborator
//!
//! yt-dlp only reports failures as free text, so classification is a
//! best-effort substring heuristic. It sits behind [`ErrorClassifier`] so it
//! can be swapped when the upstream wording changes.

use thiserror::Error;

/// Verdict for one failed acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FailureClass {
    /// Bot detection, interactive confirmation or missing credentials
    #[error("access blocked")]
    AccessBlocked,
    /// Private, removed or otherwise permanently inaccessible content
    #[error("content unavailable")]
    ContentUnavailable,
    /// Anything else
    #[error("unclassified failure")]
    Unclassified,
}

/// Replaceable predicate mapping collaborator error text to a class
pub trait ErrorClassifier: Send + Sync {
    /// Classify an error message
    fn classify(&self, message: &str) -> FailureClass;
}

/// Patterns indicating anti-automation blocks or missing credential material
pub const ACCESS_BLOCKED_PATTERNS: &[&str] = &[
    "could not find chrome cookies",
    "sign in to confirm",
    "bot",
    "no cookies",
    "cookies are no longer valid",
    "http error 429",
];

/// Patterns indicating content that will not become available on retry
pub const CONTENT_UNAVAILABLE_PATTERNS: &[&str] = &[
    "private",
    "unavailable",
    "removed",
    "not available",
    "copyright",
];

/// Case-insensitive substring classifier
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    access_blocked: Vec<String>,
    content_unavailable: Vec<String>,
}

impl PatternClassifier {
    /// Build a classifier from custom pattern lists
    #[must_use]
    pub fn new(access_blocked: &[&str], content_unavailable: &[&str]) -> Self {
        Self {
            access_blocked: access_blocked.iter().map(|p| p.to_lowercase()).collect(),
            content_unavailable: content_unavailable
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new(ACCESS_BLOCKED_PATTERNS, CONTENT_UNAVAILABLE_PATTERNS)
    }
}

impl ErrorClassifier for PatternClassifier {
    fn classify(&self, message: &str) -> FailureClass {
        let lower = message.to_lowercase();
        // Blocked wins: "Sign in to confirm you're not a bot. This video is unavailable"
        if self.access_blocked.iter().any(|p| lower.contains(p.as_str())) {
            FailureClass::AccessBlocked
        } else if self
            .content_unavailable
            .iter()
            .any(|p| lower.contains(p.as_str()))
        {
            FailureClass::ContentUnavailable
        } else {
            FailureClass::Unclassified
        }
    }
}
