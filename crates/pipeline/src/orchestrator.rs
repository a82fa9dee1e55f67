//! Publish orchestration: one release, one pass.
//!
//! The pass is a fixed sequence: clear the schedule, resolve or build the
//! torrent, register the magnet link, stage for the download client, fan
//! out to publishers, flip visibility. Torrent failures abort the whole
//! attempt; per-publisher failures degrade that provider only and the
//! release still becomes visible.

use crate::error::{ErrorKind, Result};
use crate::paths::{TorrentPaths, torrent_file_name};
use crate::task::{self, RetryPolicy};
use exn::{OptionExt, ResultExt};
use futures::future::join_all;
use koukai_config::Config;
use koukai_publish::PublisherHandle;
use koukai_store::{MAGNET_PROVIDER, Repository};
use koukai_torrent::Metainfo;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;

pub struct Orchestrator {
    repo: Repository,
    publishers: Vec<PublisherHandle>,
    config: Arc<Config>,
    policy: RetryPolicy,
}

impl Orchestrator {
    pub fn new(repo: Repository, publishers: Vec<PublisherHandle>, config: Arc<Config>) -> Self {
        let policy = RetryPolicy::from_config(&config.retry);
        Self {
            repo,
            publishers,
            config,
            policy,
        }
    }

    pub(crate) fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run one publication pass for `release_id`.
    ///
    /// Safe to re-run: an existing artifact short-circuits hashing, staging
    /// never overwrites, and providers with a recorded link are skipped.
    /// With `dry_run` set the pass describes every side effect instead of
    /// performing it: no link rows, no staging, no network, no visibility
    /// or schedule change.
    pub async fn publish_release(&self, release_id: i64, dry_run: bool) -> Result<()> {
        let release = self
            .repo
            .get(release_id)
            .await
            .or_raise(|| ErrorKind::Store)?
            .ok_or_raise(|| ErrorKind::UnknownRelease(release_id))?;
        tracing::info!(release = release_id, project = %release.project, dry_run, "publishing release");

        if !dry_run {
            // Cleared before any side effect so the next scheduler tick
            // cannot pick this release up again. A worker crash past this
            // point requires a manual re-trigger.
            self.repo
                .clear_schedule(release_id)
                .await
                .or_raise(|| ErrorKind::Store)?;
        }

        let Some(content_rel) = release.content_path else {
            exn::bail!(ErrorKind::MissingContentPath(release_id));
        };
        let content_path = self.config.paths.data_dir.join(content_rel);
        let file_name = torrent_file_name(&content_path)
            .ok_or_raise(|| ErrorKind::UnusableContentPath(content_path.clone()))?;
        let paths = TorrentPaths::resolve(
            &self.config.paths.torrents_dir,
            &self.config.paths.transmission_watchdir,
            &file_name,
        );

        let metainfo = self.resolve_or_build(&paths, &content_path).await?;
        if !dry_run {
            self.repo
                .upsert_link(release_id, MAGNET_PROVIDER, &metainfo.magnet())
                .await
                .or_raise(|| ErrorKind::Store)?;
        }

        self.stage(&paths, dry_run).await?;
        self.fan_out(release_id, &paths.build, &content_path, dry_run)
            .await;

        if !dry_run {
            self.repo
                .mark_published(release_id, OffsetDateTime::now_utc())
                .await
                .or_raise(|| ErrorKind::Store)?;
            tracing::info!(release = release_id, "release is now public");
        }
        Ok(())
    }

    /// Reuse the artifact from any of its three well-known locations, or
    /// hash the content and build one. Either way the build path holds a
    /// copy afterwards, which is what staging and publishers read from.
    async fn resolve_or_build(&self, paths: &TorrentPaths, content_path: &Path) -> Result<Metainfo> {
        for candidate in paths.candidates() {
            if !tokio::fs::try_exists(candidate).await.map_err(ErrorKind::Io)? {
                continue;
            }
            tracing::info!(artifact = %candidate.display(), "reusing existing torrent artifact");
            let data = tokio::fs::read(candidate).await.map_err(ErrorKind::Io)?;
            let metainfo = Metainfo::from_bytes(&data).or_raise(|| ErrorKind::Torrent)?;
            if !tokio::fs::try_exists(&paths.build).await.map_err(ErrorKind::Io)? {
                self.write_artifact(&paths.build, metainfo.as_bytes()).await?;
            }
            return Ok(metainfo);
        }

        let content = content_path.to_path_buf();
        let trackers = self.config.torrent.trackers.clone();
        let cap = self.config.torrent.max_piece_size;
        // Hashing is CPU+IO bound and can chew through gigabytes; keep it
        // off the async workers.
        let metainfo = tokio::task::spawn_blocking(move || {
            koukai_torrent::build(&content, &trackers, cap, |file, done, total| {
                tracing::debug!(file = %file.display(), done, total, "hashing");
            })
        })
        .await
        .or_raise(|| ErrorKind::Torrent)?
        .or_raise(|| ErrorKind::Torrent)?;

        self.write_artifact(&paths.build, metainfo.as_bytes()).await?;
        Ok(metainfo)
    }

    async fn write_artifact(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(ErrorKind::Io)?;
        }
        tokio::fs::write(path, data).await.map_err(ErrorKind::Io)?;
        Ok(())
    }

    /// Hand the artifact to the download client exactly once. Skipped when
    /// either the canonical or the consumed path exists; neither is ever
    /// overwritten (the rename is the client's bookkeeping, not ours).
    async fn stage(&self, paths: &TorrentPaths, dry_run: bool) -> Result<()> {
        if paths.staged().await.map_err(ErrorKind::Io)? {
            tracing::debug!(artifact = %paths.watch.display(), "already staged for download client");
            return Ok(());
        }
        if dry_run {
            tracing::info!(
                artifact = %paths.watch.display(),
                "dry run: skipping download client staging"
            );
            return Ok(());
        }
        if let Some(parent) = paths.watch.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(ErrorKind::Io)?;
        }
        tokio::fs::copy(&paths.build, &paths.watch)
            .await
            .map_err(ErrorKind::Io)?;
        tracing::info!(artifact = %paths.watch.display(), "staged artifact for download client");
        Ok(())
    }

    /// Dispatch one isolated task per publisher that has no recorded link
    /// yet. Task failures are logged and swallowed: siblings keep running
    /// and the release still goes public without the failed provider.
    async fn fan_out(&self, release_id: i64, torrent_path: &Path, content_path: &Path, dry_run: bool) {
        let mut tasks = Vec::new();
        for publisher in &self.publishers {
            let name = publisher.name();
            // The link registry is the idempotency gate: an existing link
            // under this provider tag means the announcement already
            // happened, so no new call is made.
            match self.repo.find_link(release_id, name).await {
                Ok(Some(_)) => {
                    tracing::debug!(publisher = name, release = release_id, "link exists, skipping");
                    continue;
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::error!(publisher = name, %error, "link lookup failed, skipping publisher");
                    continue;
                }
            }
            tasks.push(tokio::spawn(Self::publish_one(
                self.repo.clone(),
                Arc::clone(publisher),
                self.policy,
                torrent_path.to_path_buf(),
                content_path.to_path_buf(),
                release_id,
                dry_run,
            )));
        }
        for outcome in join_all(tasks).await {
            if let Err(error) = outcome {
                tracing::error!(%error, "publisher task aborted");
            }
        }
    }

    async fn publish_one(
        repo: Repository,
        publisher: PublisherHandle,
        policy: RetryPolicy,
        torrent_path: PathBuf,
        content_path: PathBuf,
        release_id: i64,
        dry_run: bool,
    ) {
        let name = publisher.name();
        let attempts = task::run_retrying(&policy, name, || {
            let publisher = Arc::clone(&publisher);
            let torrent_path = torrent_path.clone();
            let content_path = content_path.clone();
            async move { publisher.publish(&torrent_path, &content_path, dry_run).await }
        });
        match task::with_deadline(policy.timeout, name, attempts).await {
            Ok(Ok(Some(url))) => match repo.upsert_link(release_id, name, &url).await {
                Ok(()) => tracing::info!(publisher = name, release = release_id, url, "announced"),
                Err(error) => {
                    tracing::error!(publisher = name, %error, "announced but could not record the link");
                }
            },
            Ok(Ok(None)) => {}
            Ok(Err(error)) => {
                tracing::error!(
                    publisher = name,
                    release = release_id,
                    %error,
                    "publisher failed; release proceeds without its link"
                );
            }
            Err(error) => {
                tracing::error!(publisher = name, release = release_id, %error, "publisher task terminated");
            }
        }
    }
}
