//! Repository for releases, their files, and their outbound links.
//!
//! All writes are deliberately narrow (a single timestamp clear, a single
//! visibility flip, a single link upsert) so that concurrent pipeline tasks
//! touching the same release cannot lose each other's updates.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{Language, Release, ReleaseFileRow, ReleaseLinkRow, ReleaseRow};
use exn::ResultExt;
use sqlx::SqlitePool;
use std::path::PathBuf;
use time::OffsetDateTime;

/// Repository over the release ledger.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self::new(db.pool().clone())
    }
}

/// A release record as created by the ingestion step (or test fixtures).
#[derive(Debug, Clone)]
pub struct NewRelease {
    pub project: String,
    pub release_date: OffsetDateTime,
    pub scheduled_publication_date: Option<OffsetDateTime>,
    pub content_path: Option<PathBuf>,
}

/// A file record as created by the ingestion step (or test fixtures).
#[derive(Debug, Clone)]
pub struct NewReleaseFile {
    pub file_name: String,
    pub file_version: u32,
    pub episode_number: Option<u32>,
    pub episode_title: Option<String>,
    pub languages: Vec<Language>,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Load a release with its files (ordered by file name) and links.
    pub async fn get(&self, id: i64) -> Result<Option<Release>> {
        let row: Option<ReleaseRow> = sqlx::query_as(include_str!("../queries/get_release.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut release = Release::try_from(row)?;

        let files: Vec<ReleaseFileRow> =
            sqlx::query_as(include_str!("../queries/files_for_release.sql"))
                .bind(id)
                .fetch_all(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        release.files = files
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>>>()?;

        let links: Vec<ReleaseLinkRow> =
            sqlx::query_as(include_str!("../queries/links_for_release.sql"))
                .bind(id)
                .fetch_all(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        release.links = links.into_iter().map(Into::into).collect();

        Ok(Some(release))
    }

    /// Ids of releases due for publication: scheduled at or before `now`
    /// and still hidden. A release whose schedule was cleared by a previous
    /// orchestration pass no longer matches.
    pub async fn list_due(&self, now: OffsetDateTime) -> Result<Vec<i64>> {
        sqlx::query_scalar(include_str!("../queries/list_due.sql"))
            .bind(now.unix_timestamp())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// The URL recorded for a release under the given provider tag, if any.
    pub async fn find_link(&self, id: i64, provider: &str) -> Result<Option<String>> {
        sqlx::query_scalar(include_str!("../queries/find_link.sql"))
            .bind(id)
            .bind(provider)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    // =========================================================================
    // Narrow writes
    // =========================================================================

    /// Clear the scheduled publication timestamp.
    ///
    /// The orchestrator calls this before performing any side effect so a
    /// subsequent scheduler tick cannot pick the release up again.
    pub async fn clear_schedule(&self, id: i64) -> Result<()> {
        sqlx::query(include_str!("../queries/clear_schedule.sql"))
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Flip the release public and stamp its displayed date to `now`
    /// (decoupling actual publication time from the originally planned one).
    pub async fn mark_published(&self, id: i64, now: OffsetDateTime) -> Result<()> {
        sqlx::query(include_str!("../queries/mark_published.sql"))
            .bind(now.unix_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// The link registry: create or overwrite the release's link for one
    /// provider tag. At most one link per (release, provider) pair, enforced
    /// by the schema, so re-running a publication pass never duplicates.
    pub async fn upsert_link(&self, id: i64, provider: &str, url: &str) -> Result<()> {
        sqlx::query(include_str!("../queries/upsert_link.sql"))
            .bind(id)
            .bind(provider)
            .bind(url)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Insert a release record. Releases are created hidden; visibility is
    /// only ever granted by a successful orchestration pass.
    pub async fn insert_release(&self, release: &NewRelease) -> Result<i64> {
        let result = sqlx::query(include_str!("../queries/insert_release.sql"))
            .bind(&release.project)
            .bind(release.release_date.unix_timestamp())
            .bind(
                release
                    .scheduled_publication_date
                    .map(|ts| ts.unix_timestamp()),
            )
            .bind(0i64)
            .bind(
                release
                    .content_path
                    .as_ref()
                    .map(|path| path.to_string_lossy().into_owned()),
            )
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.last_insert_rowid())
    }

    /// Attach a file record to a release.
    pub async fn insert_file(&self, release_id: i64, file: &NewReleaseFile) -> Result<i64> {
        let languages =
            serde_json::to_string(&file.languages).or_raise(|| ErrorKind::InvalidData("languages"))?;
        let result = sqlx::query(include_str!("../queries/insert_file.sql"))
            .bind(release_id)
            .bind(&file.file_name)
            .bind(i64::from(file.file_version))
            .bind(file.episode_number.map(i64::from))
            .bind(&file.episode_title)
            .bind(languages)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.last_insert_rowid())
    }
}
