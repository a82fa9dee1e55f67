use crate::MAGNET_PROVIDER;
use crate::error::{Error, ErrorKind};
use crate::models::{Language, ReleaseFile, ReleaseLink};
use exn::ResultExt;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use time::OffsetDateTime;

static BTIH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)magnet.*btih:([0-9a-f]+)").unwrap());

/// One publishable unit: a set of files released together under a project.
///
/// # Lifecycle
/// Created externally as a draft (hidden, publication date unset or in the
/// future), becomes scheduled once a future publication timestamp is set,
/// and is transitioned by the orchestrator: the timestamp is cleared before
/// any publication side effect, and visibility flips true only after a
/// successful non-dry-run pass.
#[derive(Debug, Clone)]
pub struct Release {
    pub id: i64,
    pub project: String,
    pub release_date: OffsetDateTime,
    pub scheduled_publication_date: Option<OffsetDateTime>,
    pub is_visible: bool,
    /// Content location relative to the configured data root. A release
    /// without one cannot be published.
    pub content_path: Option<PathBuf>,
    /// Ordered by file name.
    pub files: Vec<ReleaseFile>,
    pub links: Vec<ReleaseLink>,
}

impl Release {
    /// The release's exposed language list: the order-preserving,
    /// de-duplicated concatenation of its files' language lists.
    pub fn languages(&self) -> Vec<Language> {
        let mut seen = Vec::new();
        for file in &self.files {
            for lang in &file.languages {
                if !seen.contains(lang) {
                    seen.push(lang.clone());
                }
            }
        }
        seen
    }

    /// The link recorded under the given provider tag, if any.
    pub fn find_link(&self, provider: &str) -> Option<&ReleaseLink> {
        self.links.iter().find(|link| link.provider == provider)
    }

    /// BitTorrent info hash recovered from the stored magnet link, if any.
    /// Read-side convenience only; never used for link identity.
    pub fn btih(&self) -> Option<String> {
        let link = self.find_link(MAGNET_PROVIDER)?;
        BTIH.captures(&link.url)
            .and_then(|captures| captures.get(1))
            .map(|hash| hash.as_str().to_ascii_lowercase())
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ReleaseRow {
    pub(crate) id: i64,
    pub(crate) project: String,
    pub(crate) release_date: i64,
    pub(crate) scheduled_publication_date: Option<i64>,
    pub(crate) is_visible: i64,
    pub(crate) content_path: Option<String>,
}

impl TryFrom<ReleaseRow> for Release {
    type Error = Error;
    fn try_from(row: ReleaseRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            project: row.project,
            release_date: OffsetDateTime::from_unix_timestamp(row.release_date)
                .or_raise(|| ErrorKind::InvalidData("release date"))?,
            scheduled_publication_date: row
                .scheduled_publication_date
                .map(|ts| {
                    OffsetDateTime::from_unix_timestamp(ts)
                        .or_raise(|| ErrorKind::InvalidData("scheduled publication date"))
                })
                .transpose()?,
            is_visible: row.is_visible != 0,
            content_path: row.content_path.map(PathBuf::from),
            files: Vec::new(),
            links: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release() -> Release {
        Release {
            id: 1,
            project: "show".to_string(),
            release_date: OffsetDateTime::UNIX_EPOCH,
            scheduled_publication_date: None,
            is_visible: false,
            content_path: None,
            files: Vec::new(),
            links: Vec::new(),
        }
    }

    fn file(name: &str, languages: &[&str]) -> ReleaseFile {
        ReleaseFile {
            id: 0,
            file_name: name.to_string(),
            file_version: 1,
            episode_number: None,
            episode_title: None,
            languages: languages.iter().copied().map(Language::from).collect(),
        }
    }

    #[test]
    fn test_languages_deduplicate_preserving_order() {
        let mut release = release();
        release.files = vec![
            file("a.mkv", &["en", "pl"]),
            file("b.mkv", &["pl", "ro"]),
            file("c.mkv", &["en"]),
        ];
        let codes: Vec<_> = release.languages().iter().map(|l| l.code().to_string()).collect();
        assert_eq!(codes, ["en", "pl", "ro"]);
    }

    #[test]
    fn test_btih_reads_the_magnet_link() {
        let mut release = release();
        release.links = vec![ReleaseLink {
            id: 1,
            provider: MAGNET_PROVIDER.to_string(),
            url: "magnet:?xt=urn:btih:CA5B7BCF892317DA519B88162AD81405F21DE8C7&dn=x".to_string(),
        }];
        assert_eq!(
            release.btih().as_deref(),
            Some("ca5b7bcf892317da519b88162ad81405f21de8c7")
        );
    }

    #[test]
    fn test_btih_is_none_without_magnet() {
        let mut release = release();
        release.links = vec![ReleaseLink {
            id: 1,
            provider: "nyaa.si".to_string(),
            url: "https://nyaa.si/view/1".to_string(),
        }];
        assert_eq!(release.btih(), None);
    }
}
