use crate::error::{Error, ErrorKind};
use crate::models::Language;
use exn::ResultExt;

/// A single file within a release. Immutable once created by the ingestion
/// step; the pipeline only reads these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseFile {
    pub id: i64,
    pub file_name: String,
    pub file_version: u32,
    pub episode_number: Option<u32>,
    pub episode_title: Option<String>,
    /// Language codes in ingestion order.
    pub languages: Vec<Language>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct ReleaseFileRow {
    pub(crate) id: i64,
    #[allow(dead_code)]
    pub(crate) release_id: i64,
    pub(crate) file_name: String,
    pub(crate) file_version: i64,
    pub(crate) episode_number: Option<i64>,
    pub(crate) episode_title: Option<String>,
    /// JSON array of language codes.
    pub(crate) languages: String,
}

impl TryFrom<ReleaseFileRow> for ReleaseFile {
    type Error = Error;
    fn try_from(row: ReleaseFileRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            file_name: row.file_name,
            file_version: u32::try_from(row.file_version)
                .or_raise(|| ErrorKind::InvalidData("file version"))?,
            episode_number: row
                .episode_number
                .map(|n| u32::try_from(n).or_raise(|| ErrorKind::InvalidData("episode number")))
                .transpose()?,
            episode_title: row.episode_title,
            languages: serde_json::from_str(&row.languages)
                .or_raise(|| ErrorKind::InvalidData("languages"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_to_model() {
        let row = ReleaseFileRow {
            id: 7,
            release_id: 1,
            file_name: "Show - 01 [deadbeef].mkv".to_string(),
            file_version: 1,
            episode_number: Some(1),
            episode_title: Some("Premiere".to_string()),
            languages: r#"["en","pl"]"#.to_string(),
        };
        let file = ReleaseFile::try_from(row).unwrap();
        assert_eq!(file.file_version, 1);
        assert_eq!(file.languages, vec![Language::from("en"), Language::from("pl")]);
    }

    #[test]
    fn test_malformed_languages_column_is_rejected() {
        let row = ReleaseFileRow {
            id: 7,
            release_id: 1,
            file_name: "x.mkv".to_string(),
            file_version: 1,
            episode_number: None,
            episode_title: None,
            languages: "not json".to_string(),
        };
        let err = ReleaseFile::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("languages")));
    }
}
