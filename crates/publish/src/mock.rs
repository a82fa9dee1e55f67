//! Scripted publisher for testing orchestration.

use crate::error::{ErrorKind, Result};
use crate::Publisher;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;

/// One recorded `publish` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub torrent_path: std::path::PathBuf,
    pub content_path: std::path::PathBuf,
    pub dry_run: bool,
}

/// A publisher whose behaviour is scripted at construction and whose calls
/// are recorded. Lets pipeline tests observe exactly what the fan-out did
/// without filesystem or network dependencies.
pub struct MockPublisher {
    name: &'static str,
    url: Option<String>,
    fail: bool,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockPublisher {
    /// A publisher that always succeeds with the given URL.
    pub fn succeeding(name: &'static str, url: impl Into<String>) -> Self {
        Self {
            name,
            url: Some(url.into()),
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A publisher that succeeds without an addressable result (like the
    /// relay-bot variant).
    pub fn silent(name: &'static str) -> Self {
        Self {
            name,
            url: None,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A publisher that fails every live attempt (simulated outage).
    pub fn failing(name: &'static str) -> Self {
        Self {
            name,
            url: None,
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every recorded invocation, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of non-dry-run invocations.
    pub fn live_calls(&self) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| !call.dry_run).count()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn publish(
        &self,
        torrent_path: &Path,
        content_path: &Path,
        dry_run: bool,
    ) -> Result<Option<String>> {
        self.calls.lock().unwrap().push(RecordedCall {
            torrent_path: torrent_path.to_path_buf(),
            content_path: content_path.to_path_buf(),
            dry_run,
        });
        if dry_run {
            return Ok(None);
        }
        if self.fail {
            exn::bail!(ErrorKind::Status(503));
        }
        Ok(self.url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_outcomes() {
        let ok = MockPublisher::succeeding("ok", "https://example.org/1");
        let down = MockPublisher::failing("down");

        let url = ok.publish(Path::new("/a.torrent"), Path::new("/a"), false).await.unwrap();
        assert_eq!(url.as_deref(), Some("https://example.org/1"));
        assert!(down.publish(Path::new("/a.torrent"), Path::new("/a"), false).await.is_err());

        assert_eq!(ok.live_calls(), 1);
        assert_eq!(down.live_calls(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_is_recorded_but_returns_nothing() {
        let mock = MockPublisher::succeeding("ok", "https://example.org/1");
        let url = mock.publish(Path::new("/a.torrent"), Path::new("/a"), true).await.unwrap();
        assert_eq!(url, None);
        assert_eq!(mock.live_calls(), 0);
        assert_eq!(mock.calls().len(), 1);
    }
}
