//! Relay-bot publisher: symlink staging into the IRC bot's watch directory.
//!
//! The bot serves whatever the watch directory points at, so "publishing"
//! is (re)creating a symlink to the release content. Idempotent by
//! unlink-if-symlink-then-relink; a real file occupying the path is left
//! alone and no link is made.

use crate::error::{ErrorKind, Result};
use crate::{Publisher, file_name_of};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

pub struct Ircbot {
    watchdir: PathBuf,
}

impl Ircbot {
    pub fn new(watchdir: PathBuf) -> Self {
        Self { watchdir }
    }
}

#[async_trait]
impl Publisher for Ircbot {
    fn name(&self) -> &'static str {
        "ircbot"
    }

    async fn publish(
        &self,
        _torrent_path: &Path,
        content_path: &Path,
        dry_run: bool,
    ) -> Result<Option<String>> {
        let link_path = self.watchdir.join(file_name_of(content_path)?);
        if dry_run {
            tracing::info!(
                publisher = self.name(),
                source = %link_path.display(),
                target = %content_path.display(),
                "dry run: skipping symlink"
            );
            return Ok(None);
        }

        // Drop a stale symlink from an earlier pass before relinking.
        match tokio::fs::symlink_metadata(&link_path).await {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                tokio::fs::remove_file(&link_path)
                    .await
                    .map_err(ErrorKind::Io)?;
            }
            Ok(_) | Err(_) => {}
        }
        if !path_occupied(&link_path).await? {
            if let Some(parent) = link_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(ErrorKind::Io)?;
            }
            tokio::fs::symlink(content_path, &link_path)
                .await
                .map_err(ErrorKind::Io)?;
            tracing::info!(
                publisher = self.name(),
                source = %link_path.display(),
                target = %content_path.display(),
                "staged content for relay bot"
            );
        }
        Ok(None)
    }
}

async fn path_occupied(path: &Path) -> Result<bool> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(_) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(exn::Exn::from(ErrorKind::Io(error))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, Ircbot, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let content = dir.path().join("data").join("test file.txt");
        std::fs::create_dir_all(content.parent().unwrap()).unwrap();
        std::fs::write(&content, "123").unwrap();
        let ircbot = Ircbot::new(dir.path().join("watch"));
        (dir, ircbot, content)
    }

    #[tokio::test]
    async fn test_creates_symlink_into_watchdir() {
        let (dir, ircbot, content) = fixture();
        let url = ircbot.publish(Path::new("/x.torrent"), &content, false).await.unwrap();
        assert_eq!(url, None, "local variant never yields a URL");

        let link = dir.path().join("watch").join("test file.txt");
        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_to_string(&link).unwrap(), "123");
    }

    #[tokio::test]
    async fn test_republishing_relinks_idempotently() {
        let (dir, ircbot, content) = fixture();
        ircbot.publish(Path::new("/x.torrent"), &content, false).await.unwrap();
        ircbot.publish(Path::new("/x.torrent"), &content, false).await.unwrap();

        let link = dir.path().join("watch").join("test file.txt");
        assert_eq!(std::fs::read_to_string(&link).unwrap(), "123");
    }

    #[tokio::test]
    async fn test_real_file_at_link_path_is_left_alone() {
        let (dir, ircbot, content) = fixture();
        let link = dir.path().join("watch").join("test file.txt");
        std::fs::create_dir_all(link.parent().unwrap()).unwrap();
        std::fs::write(&link, "precious").unwrap();

        ircbot.publish(Path::new("/x.torrent"), &content, false).await.unwrap();
        assert!(!std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_to_string(&link).unwrap(), "precious");
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let (dir, ircbot, content) = fixture();
        ircbot.publish(Path::new("/x.torrent"), &content, true).await.unwrap();
        assert!(!dir.path().join("watch").exists());
    }
}
