//! nyaa.net (pantsu) publisher.
//!
//! Authenticates with an API key in the `Authorization` header. The
//! response is JSON; the public page URL is derived from the returned
//! torrent id.

use crate::error::{ErrorKind, Result};
use crate::{Publisher, display_name_of, file_name_of, response_errors};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::Path;

const VIEW_URL: &str = "https://nyaa.net/view";

pub struct NyaaPantsu {
    client: reqwest::Client,
    config: koukai_config::NyaaPantsu,
}

impl NyaaPantsu {
    pub fn new(client: reqwest::Client, config: koukai_config::NyaaPantsu) -> Self {
        Self { client, config }
    }

    fn fields(&self, name: &str) -> Vec<(&'static str, String)> {
        vec![
            ("username", self.config.username.clone()),
            ("name", name.to_string()),
            ("c", self.config.category_id.clone()),
            ("remake", "false".to_string()),
            ("desc", String::new()),
            ("hidden", "false".to_string()),
            ("website_link", self.config.website.clone()),
            ("languages", self.config.languages.clone()),
        ]
    }
}

#[async_trait]
impl Publisher for NyaaPantsu {
    fn name(&self) -> &'static str {
        "nyaa.net"
    }

    async fn publish(
        &self,
        torrent_path: &Path,
        _content_path: &Path,
        dry_run: bool,
    ) -> Result<Option<String>> {
        let fields = self.fields(&display_name_of(torrent_path)?);
        if dry_run {
            let payload = serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(key, value)| ((*key).to_string(), serde_json::Value::from(value.clone())))
                    .collect(),
            );
            tracing::info!(
                publisher = self.name(),
                %payload,
                torrent = %torrent_path.display(),
                "dry run: skipping upload"
            );
            return Ok(None);
        }

        let torrent = tokio::fs::read(torrent_path).await.map_err(ErrorKind::Io)?;
        let mut form = Form::new().part(
            "torrent",
            Part::bytes(torrent).file_name(file_name_of(torrent_path)?),
        );
        for (key, value) in fields {
            form = form.text(key, value);
        }
        let response = self
            .client
            .post(&self.config.api_url)
            .header("Authorization", &self.config.api_key)
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
        let id = body
            .pointer("/data/id")
            .ok_or_else(|| exn::Exn::from(ErrorKind::Malformed("response without data.id")))?;
        let id = match id {
            serde_json::Value::String(id) => id.clone(),
            other => other.to_string(),
        };
        Ok(Some(format!("{VIEW_URL}/{id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_is_pure() {
        let publisher = NyaaPantsu::new(
            reqwest::Client::new(),
            koukai_config::NyaaPantsu {
                api_url: "https://nyaa.net/api/upload".to_string(),
                username: "user".to_string(),
                api_key: "key".to_string(),
                website: "https://example.org".to_string(),
                category_id: "3_5".to_string(),
                languages: "en".to_string(),
            },
        );
        let result = publisher
            .publish(Path::new("/nonexistent/x.torrent"), Path::new("/nonexistent/x"), true)
            .await
            .unwrap();
        assert_eq!(result, None);
    }
}
