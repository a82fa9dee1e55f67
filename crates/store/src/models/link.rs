/// An outbound announcement link recorded for a release.
///
/// The provider tag is explicit and unique per release; it is the write-side
/// identity for idempotent link upserts. Nothing may derive provider
/// identity from the URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseLink {
    pub id: i64,
    pub provider: String,
    pub url: String,
}

#[derive(sqlx::FromRow)]
pub(crate) struct ReleaseLinkRow {
    pub(crate) id: i64,
    #[allow(dead_code)]
    pub(crate) release_id: i64,
    pub(crate) provider: String,
    pub(crate) url: String,
}

impl From<ReleaseLinkRow> for ReleaseLink {
    fn from(row: ReleaseLinkRow) -> Self {
        Self {
            id: row.id,
            provider: row.provider,
            url: row.url,
        }
    }
}
