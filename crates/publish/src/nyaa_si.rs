//! nyaa.si publisher.
//!
//! Authenticates with HTTP basic auth. The upload metadata travels as a
//! JSON document inside the `torrent_data` form field; the response is JSON
//! with either an `errors` member or the public `url`.

use crate::error::{ErrorKind, Result};
use crate::{Publisher, display_name_of, file_name_of, response_errors};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::Path;

pub struct NyaaSi {
    client: reqwest::Client,
    config: koukai_config::NyaaSi,
}

impl NyaaSi {
    pub fn new(client: reqwest::Client, config: koukai_config::NyaaSi) -> Self {
        Self { client, config }
    }

    fn torrent_data(&self, name: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "category": self.config.category_id,
            "information": self.config.information,
            "description": "",
            "anonymous": false,
            "hidden": false,
            "complete": false,
            "remake": false,
            "trusted": true,
        })
    }
}

#[async_trait]
impl Publisher for NyaaSi {
    fn name(&self) -> &'static str {
        "nyaa.si"
    }

    async fn publish(
        &self,
        torrent_path: &Path,
        _content_path: &Path,
        dry_run: bool,
    ) -> Result<Option<String>> {
        let torrent_data = self.torrent_data(&display_name_of(torrent_path)?);
        if dry_run {
            tracing::info!(
                publisher = self.name(),
                payload = %torrent_data,
                torrent = %torrent_path.display(),
                "dry run: skipping upload"
            );
            return Ok(None);
        }

        let torrent = tokio::fs::read(torrent_path).await.map_err(ErrorKind::Io)?;
        let form = Form::new()
            .text("torrent_data", torrent_data.to_string())
            .part(
                "torrent",
                Part::bytes(torrent).file_name(file_name_of(torrent_path)?),
            );
        let response = self
            .client
            .post(&self.config.api_url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .multipart(form)
            .send()
            .await
            .map_err(ErrorKind::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(ErrorKind::Transport)?;
        if !status.is_success() {
            exn::bail!(ErrorKind::Status(status.as_u16()));
        }
        let body: serde_json::Value = serde_json::from_str(&body)
            .map_err(|_| ErrorKind::Malformed("response is not JSON"))?;
        if let Some(errors) = response_errors(&body) {
            exn::bail!(ErrorKind::Rejected(errors));
        }
        let url = body
            .get("url")
            .and_then(|url| url.as_str())
            .ok_or_else(|| exn::Exn::from(ErrorKind::Malformed("response without url")))?;
        Ok(Some(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_is_pure() {
        let publisher = NyaaSi::new(
            reqwest::Client::new(),
            koukai_config::NyaaSi {
                api_url: "https://nyaa.si/api/upload".to_string(),
                username: "user".to_string(),
                password: "pass".to_string(),
                information: "https://example.org".to_string(),
                category_id: "1_2".to_string(),
            },
        );
        let result = publisher
            .publish(Path::new("/nonexistent/x.torrent"), Path::new("/nonexistent/x"), true)
            .await
            .unwrap();
        assert_eq!(result, None);
    }
}
