//! Scoped credentials file
//!
//! yt-dlp reads cookies from a file, so locally supplied cookie text is
//! written to a uniquely named temporary file for the duration of one
//! resolve call. The file is removed when the guard drops, which covers
//! success, every failure branch, panics and cancelled futures alike.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Temporary cookie file removed on drop
#[derive(Debug)]
pub struct CredentialsFile {
    path: PathBuf,
}

impl CredentialsFile {
    /// Write cookie text to a fresh file inside `dir`
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub async fn create(dir: &Path, cookies: &str) -> io::Result<Self> {
        let path = dir.join(format!("cookies-{}.txt", Uuid::new_v4().as_simple()));
        tokio::fs::write(&path, cookies).await?;
        debug!(path = %path.display(), "Credentials file created");
        Ok(Self { path })
    }

    /// Location of the file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CredentialsFile {
    fn drop(&mut self) {
        // Sync removal: Drop cannot await and may run outside the runtime
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Credentials file removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Failed to remove credentials file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_exists_while_guard_lives() -> io::Result<()> {
        let guard = CredentialsFile::create(&std::env::temp_dir(), "cookie-data").await?;
        let path = guard.path().to_path_buf();
        assert_eq!(tokio::fs::read_to_string(&path).await?, "cookie-data");

        drop(guard);
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_file_removed_when_task_panics() -> io::Result<()> {
        let guard = CredentialsFile::create(&std::env::temp_dir(), "x").await?;
        let path = guard.path().to_path_buf();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            panic!("attempt blew up");
        });
        assert!(handle.await.is_err());
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_fails_for_missing_directory() {
        let dir = std::env::temp_dir().join(format!("missing-{}", Uuid::new_v4()));
        assert!(CredentialsFile::create(&dir, "x").await.is_err());
    }
}
