//! anidex.info publisher.
//!
//! Authenticates with an API key passed as a form field. The endpoint
//! answers a bare URL in the response body on success and an error message
//! otherwise, so success detection is "does it look like a link".

use crate::error::{ErrorKind, Result};
use crate::{Publisher, file_name_of};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::Path;

pub struct Anidex {
    client: reqwest::Client,
    config: koukai_config::Anidex,
}

impl Anidex {
    pub fn new(client: reqwest::Client, config: koukai_config::Anidex) -> Self {
        Self { client, config }
    }

    fn form(&self, torrent: Vec<u8>, file_name: String) -> Form {
        Form::new()
            .text("api_key", self.config.api_key.clone())
            .text("subcat_id", self.config.category_id.to_string())
            .text("lang_id", self.config.language_id.to_string())
            .text("group_id", self.config.group_id.to_string())
            .text("tt_api", "1")
            .text("private", "0")
            .part("file", Part::bytes(torrent).file_name(file_name))
    }

    async fn upload(&self, torrent: &[u8], file_name: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.config.api_url)
            .multipart(self.form(torrent.to_vec(), file_name.to_string()))
            .send()
            .await
            .map_err(ErrorKind::Transport)?;
        let status = response.status();
        let body = response.text().await.map_err(ErrorKind::Transport)?;
        if !status.is_success() {
            exn::bail!(ErrorKind::Status(status.as_u16()));
        }
        if !body.starts_with("https://") {
            exn::bail!(ErrorKind::Rejected(body));
        }
        Ok(body)
    }
}

#[async_trait]
impl Publisher for Anidex {
    fn name(&self) -> &'static str {
        "anidex.info"
    }

    async fn publish(
        &self,
        torrent_path: &Path,
        _content_path: &Path,
        dry_run: bool,
    ) -> Result<Option<String>> {
        let payload = serde_json::json!({
            "api_key": self.config.api_key,
            "subcat_id": self.config.category_id,
            "lang_id": self.config.language_id,
            "group_id": self.config.group_id,
            "tt_api": 1,
            "private": 0,
        });
        if dry_run {
            tracing::info!(
                publisher = self.name(),
                %payload,
                torrent = %torrent_path.display(),
                "dry run: skipping upload"
            );
            return Ok(None);
        }

        let torrent = tokio::fs::read(torrent_path).await.map_err(ErrorKind::Io)?;
        let file_name = file_name_of(torrent_path)?;

        // A few immediate retries absorb this endpoint's flaky responses
        // before the task-level retry policy gets involved.
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.upload(&torrent, &file_name).await {
                Ok(url) => return Ok(Some(url)),
                Err(error) if attempt < self.config.max_retries => {
                    tracing::warn!(
                        publisher = self.name(),
                        attempt,
                        %error,
                        "upload attempt failed, retrying"
                    );
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anidex() -> Anidex {
        Anidex::new(
            reqwest::Client::new(),
            koukai_config::Anidex {
                api_url: "https://anidex.info/api/".to_string(),
                api_key: "secret".to_string(),
                group_id: 7,
                category_id: 1,
                language_id: 1,
                max_retries: 3,
            },
        )
    }

    #[tokio::test]
    async fn test_dry_run_is_pure() {
        // The torrent path doesn't even exist; a dry run must not read it,
        // let alone touch the network.
        let result = anidex()
            .publish(Path::new("/nonexistent/x.torrent"), Path::new("/nonexistent/x"), true)
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_missing_artifact_is_an_io_error() {
        let err = anidex()
            .publish(Path::new("/nonexistent/x.torrent"), Path::new("/nonexistent/x"), false)
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
        assert!(err.is_retryable());
    }
}
