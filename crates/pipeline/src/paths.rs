//! The staging-path contract shared with the download client.
//!
//! The client polls its watch directory and renames files it has consumed
//! by appending [`CONSUMED_SUFFIX`], at arbitrary, unobservable times.
//! That external behaviour dictates two rules reproduced exactly here:
//! the watch directory is written fire-and-forget (never the same
//! directory as the build output), and both the canonical and the renamed
//! path count as "already staged" and must never be overwritten.

use std::path::{Path, PathBuf};

/// Suffix the download client appends to watch-directory files it has
/// consumed.
pub const CONSUMED_SUFFIX: &str = ".added";

/// Name of the metainfo artifact for a given content path: the file stem
/// for single files, the directory name for batch directories.
pub fn torrent_file_name(content_path: &Path) -> Option<String> {
    let base = if content_path.is_file() {
        content_path.file_stem()
    } else {
        content_path.file_name()
    }?;
    Some(format!("{}.torrent", base.to_string_lossy()))
}

/// The three well-known locations of one release's metainfo artifact.
#[derive(Debug, Clone)]
pub struct TorrentPaths {
    /// Persistent build output in the torrents directory.
    pub build: PathBuf,
    /// Canonical staging target inside the download client's watch
    /// directory.
    pub watch: PathBuf,
    /// The watch path after the client has consumed and renamed it.
    pub consumed: PathBuf,
}

impl TorrentPaths {
    pub fn resolve(torrents_dir: &Path, watchdir: &Path, file_name: &str) -> Self {
        Self {
            build: torrents_dir.join(file_name),
            watch: watchdir.join(file_name),
            consumed: watchdir.join(format!("{file_name}{CONSUMED_SUFFIX}")),
        }
    }

    /// Probe order for reusable artifacts: the canonical staging path, its
    /// consumed variant, then the build output. Hashing is the dominant
    /// cost of a publication pass, so any hit short-circuits a rebuild.
    pub fn candidates(&self) -> [&Path; 3] {
        [&self.watch, &self.consumed, &self.build]
    }

    /// Whether the artifact has already been handed to the download client
    /// (under either of its two names).
    pub async fn staged(&self) -> std::io::Result<bool> {
        Ok(tokio::fs::try_exists(&self.watch).await?
            || tokio::fs::try_exists(&self.consumed).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_torrent_file_name_uses_stem_for_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Show - 01 [deadbeef].mkv");
        std::fs::write(&file, "x").unwrap();
        assert_eq!(
            torrent_file_name(&file).as_deref(),
            Some("Show - 01 [deadbeef].torrent")
        );
    }

    #[test]
    fn test_torrent_file_name_uses_directory_name_for_batches() {
        let dir = tempfile::tempdir().unwrap();
        let batch = dir.path().join("Show S01 Batch");
        std::fs::create_dir(&batch).unwrap();
        assert_eq!(
            torrent_file_name(&batch).as_deref(),
            Some("Show S01 Batch.torrent")
        );
    }

    #[tokio::test]
    async fn test_staged_detects_the_consumed_rename() {
        let dir = tempfile::tempdir().unwrap();
        let paths = TorrentPaths::resolve(
            &dir.path().join("torrents"),
            &dir.path().join("watch"),
            "x.torrent",
        );
        assert!(!paths.staged().await.unwrap());

        std::fs::create_dir_all(dir.path().join("watch")).unwrap();
        std::fs::write(&paths.consumed, "d").unwrap();
        assert!(paths.staged().await.unwrap(), "a consumed rename still counts as staged");
    }
}
