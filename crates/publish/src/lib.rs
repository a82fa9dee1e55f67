//! Publisher integrations: everything that can announce a release.
//!
//! Each publisher is one variant behind the [`Publisher`] trait: either an
//! authenticated multipart upload to an external index's REST endpoint, or
//! a purely local side effect (a symlink into the relay bot's watch
//! directory). The set for a deployment is assembled by [`publishers`] from
//! configuration: an explicit, statically registered list, extended by
//! adding a variant here and a table there.
//!
//! Publishers are commutative and individually idempotent: ordering between
//! them is never relied upon, and the pipeline's link registry decides
//! whether a variant still needs to run at all.

mod anidex;
pub mod error;
mod ircbot;
#[cfg(feature = "mock")]
mod mock;
mod nyaa_pantsu;
mod nyaa_si;

pub use crate::anidex::Anidex;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::ircbot::Ircbot;
#[cfg(feature = "mock")]
pub use crate::mock::MockPublisher;
pub use crate::nyaa_pantsu::NyaaPantsu;
pub use crate::nyaa_si::NyaaSi;

use async_trait::async_trait;
use exn::OptionExt;
use std::path::Path;
use std::sync::Arc;

/// One way of announcing a published release.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Stable identifier of this variant. Doubles as the provider tag
    /// recorded on the release's link, which makes it the skip/retry
    /// discriminator for the whole pipeline.
    fn name(&self) -> &'static str;

    /// Announce the torrent at `torrent_path` (content at `content_path`).
    ///
    /// Returns the public URL of the announcement, or `None` for variants
    /// with no addressable result. With `dry_run` set, implementations must
    /// describe exactly the payload they would send, perform no network or
    /// filesystem mutation, and return `None`.
    ///
    /// # Errors
    /// A non-success status, or a success response whose body signals an
    /// application-level error, raises, never a silent `None` that looks
    /// like success.
    async fn publish(
        &self,
        torrent_path: &Path,
        content_path: &Path,
        dry_run: bool,
    ) -> Result<Option<String>>;
}

pub type PublisherHandle = Arc<dyn Publisher>;

/// The statically registered publisher set for a deployment.
///
/// Index variants are present iff their configuration table is; the relay
/// bot staging variant is always on (it only needs a watch directory).
pub fn publishers(config: &koukai_config::Config) -> Vec<PublisherHandle> {
    let client = reqwest::Client::new();
    let mut set: Vec<PublisherHandle> = Vec::new();
    if let Some(anidex) = &config.publishers.anidex {
        set.push(Arc::new(Anidex::new(client.clone(), anidex.clone())));
    }
    if let Some(nyaa_si) = &config.publishers.nyaa_si {
        set.push(Arc::new(NyaaSi::new(client.clone(), nyaa_si.clone())));
    }
    if let Some(nyaa_pantsu) = &config.publishers.nyaa_pantsu {
        set.push(Arc::new(NyaaPantsu::new(client, nyaa_pantsu.clone())));
    }
    set.push(Arc::new(Ircbot::new(
        config.paths.ircbot_watchdir.clone(),
    )));
    set
}

/// Final path component as an owned string.
pub(crate) fn file_name_of(path: &Path) -> Result<String> {
    Ok(path
        .file_name()
        .ok_or_raise(|| ErrorKind::InvalidPath(path.to_path_buf()))?
        .to_string_lossy()
        .into_owned())
}

/// Display name an index shows for an upload: the torrent file's stem.
pub(crate) fn display_name_of(torrent_path: &Path) -> Result<String> {
    Ok(torrent_path
        .file_stem()
        .ok_or_raise(|| ErrorKind::InvalidPath(torrent_path.to_path_buf()))?
        .to_string_lossy()
        .into_owned())
}

/// Application-level error signalled inside a 2xx JSON response body.
///
/// Mirrors the indices' convention of an `errors` member that is null or
/// empty on success.
pub(crate) fn response_errors(body: &serde_json::Value) -> Option<String> {
    let errors = body.get("errors")?;
    let empty = errors.is_null()
        || errors.as_array().is_some_and(|list| list.is_empty())
        || errors.as_str().is_some_and(|text| text.is_empty());
    if empty { None } else { Some(errors.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn full_config() -> koukai_config::Config {
        let mut config = koukai_config::Config::default();
        config.publishers.anidex = Some(koukai_config::Anidex {
            api_url: "https://anidex.info/api/".to_string(),
            api_key: "key".to_string(),
            group_id: 1,
            category_id: 1,
            language_id: 1,
            max_retries: 3,
        });
        config.publishers.nyaa_si = Some(koukai_config::NyaaSi {
            api_url: "https://nyaa.si/api/upload".to_string(),
            username: "user".to_string(),
            password: "pass".to_string(),
            information: "https://example.org".to_string(),
            category_id: "1_2".to_string(),
        });
        config.publishers.nyaa_pantsu = Some(koukai_config::NyaaPantsu {
            api_url: "https://nyaa.net/api/upload".to_string(),
            username: "user".to_string(),
            api_key: "key".to_string(),
            website: "https://example.org".to_string(),
            category_id: "3_5".to_string(),
            languages: "en".to_string(),
        });
        config
    }

    #[test]
    fn test_publishers_have_unique_names() {
        let set = publishers(&full_config());
        assert_eq!(set.len(), 4);
        let names: HashSet<_> = set.iter().map(|publisher| publisher.name()).collect();
        assert_eq!(names.len(), set.len());
    }

    #[test]
    fn test_absent_tables_are_not_registered() {
        let set = publishers(&koukai_config::Config::default());
        let names: Vec<_> = set.iter().map(|publisher| publisher.name()).collect();
        assert_eq!(names, ["ircbot"]);
    }

    #[test]
    fn test_display_name_strips_the_torrent_extension() {
        let name = display_name_of(Path::new("/srv/torrents/test file.torrent")).unwrap();
        assert_eq!(name, "test file");
    }

    #[test]
    fn test_response_errors() {
        use serde_json::json;
        assert_eq!(response_errors(&json!({"url": "x"})), None);
        assert_eq!(response_errors(&json!({"errors": null})), None);
        assert_eq!(response_errors(&json!({"errors": []})), None);
        assert_eq!(response_errors(&json!({"errors": ""})), None);
        assert!(response_errors(&json!({"errors": ["torrent exists"]})).is_some());
        assert!(response_errors(&json!({"errors": "nope"})).is_some());
    }
}
