//! Periodic publication scheduler.
//!
//! Every tick queries for releases that are due (scheduled at or before
//! now, still hidden) and dispatches the orchestrator for each. No locking
//! spans ticks: the orchestrator clears the schedule before any side
//! effect, so a release dispatched once no longer satisfies the query.

use crate::error::{ErrorKind, Result};
use crate::orchestrator::Orchestrator;
use crate::task;
use exn::ResultExt;
use futures::future::join_all;
use koukai_store::Repository;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

pub struct Scheduler {
    repo: Repository,
    orchestrator: Arc<Orchestrator>,
    period: Duration,
}

impl Scheduler {
    pub fn new(repo: Repository, orchestrator: Arc<Orchestrator>, period: Duration) -> Self {
        Self {
            repo,
            orchestrator,
            period,
        }
    }

    /// One scheduling pass: dispatch every due release concurrently and
    /// wait for the batch. Returns the ids that were dispatched.
    ///
    /// Orchestration failures are logged per release and never abort the
    /// pass; each task runs under the substrate's wall-clock budget.
    pub async fn tick(&self) -> Result<Vec<i64>> {
        let due = self
            .repo
            .list_due(OffsetDateTime::now_utc())
            .await
            .or_raise(|| ErrorKind::Store)?;
        if due.is_empty() {
            return Ok(due);
        }
        tracing::info!(count = due.len(), "dispatching due releases");

        let mut tasks = Vec::new();
        for &release_id in &due {
            let orchestrator = Arc::clone(&self.orchestrator);
            tasks.push(tokio::spawn(async move {
                let budget = orchestrator.policy().timeout;
                let pass = orchestrator.publish_release(release_id, false);
                match task::with_deadline(budget, "publish_release", pass).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        tracing::error!(release = release_id, %error, "publication failed");
                    }
                    Err(error) => {
                        tracing::error!(release = release_id, %error, "publication terminated");
                    }
                }
            }));
        }
        for outcome in join_all(tasks).await {
            if let Err(error) = outcome {
                tracing::error!(%error, "publication task aborted");
            }
        }
        Ok(due)
    }

    /// Run forever on the fixed period. Ticks that would land while a long
    /// batch is still running are skipped rather than bunched up.
    pub async fn run(&self) -> Result<()> {
        let mut timer = tokio::time::interval(self.period);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            timer.tick().await;
            if let Err(error) = self.tick().await {
                tracing::error!(%error, "scheduling pass failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use koukai_config::{Config, Paths, Retry};
    use koukai_publish::{MockPublisher, PublisherHandle};
    use koukai_store::{Database, NewRelease};
    use std::path::PathBuf;

    async fn fixture() -> (tempfile::TempDir, Scheduler, Repository, i64) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("data")).unwrap();
        std::fs::write(root.join("data/ep.mkv"), vec![3u8; 2048]).unwrap();

        let mut config = Config::default();
        config.paths = Paths {
            data_dir: root.join("data"),
            torrents_dir: root.join("torrents"),
            transmission_watchdir: root.join("watch"),
            ircbot_watchdir: root.join("ircbot"),
            database: root.join("koukai.sqlite3"),
        };
        config.retry = Retry {
            task_attempts: 1,
            backoff_ms: 0,
            timeout_secs: 30,
        };

        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let release_id = repo
            .insert_release(&NewRelease {
                project: "show".to_string(),
                release_date: OffsetDateTime::UNIX_EPOCH,
                scheduled_publication_date: Some(OffsetDateTime::from_unix_timestamp(1).unwrap()),
                content_path: Some(PathBuf::from("ep.mkv")),
            })
            .await
            .unwrap();

        let publisher = Arc::new(MockPublisher::succeeding("nyaa.si", "https://nyaa.si/view/1"));
        let orchestrator = Arc::new(Orchestrator::new(
            repo.clone(),
            vec![publisher as PublisherHandle],
            Arc::new(config),
        ));
        let scheduler = Scheduler::new(repo.clone(), orchestrator, Duration::from_secs(60));
        (dir, scheduler, repo, release_id)
    }

    #[tokio::test]
    async fn test_tick_publishes_due_releases() {
        let (_dir, scheduler, repo, release_id) = fixture().await;
        let dispatched = scheduler.tick().await.unwrap();
        assert_eq!(dispatched, vec![release_id]);

        let release = repo.get(release_id).await.unwrap().unwrap();
        assert!(release.is_visible);
        assert_eq!(release.scheduled_publication_date, None);
    }

    #[tokio::test]
    async fn test_release_is_not_picked_up_twice() {
        let (_dir, scheduler, _repo, release_id) = fixture().await;
        assert_eq!(scheduler.tick().await.unwrap(), vec![release_id]);
        assert!(
            scheduler.tick().await.unwrap().is_empty(),
            "the eager schedule clear is the idempotency boundary"
        );
    }

    #[tokio::test]
    async fn test_future_releases_are_left_alone() {
        let (_dir, scheduler, repo, _release_id) = fixture().await;
        // whole seconds: the ledger stores unix timestamps
        let future =
            OffsetDateTime::from_unix_timestamp(OffsetDateTime::now_utc().unix_timestamp() + 7 * 86_400)
                .unwrap();
        let later = repo
            .insert_release(&NewRelease {
                project: "other".to_string(),
                release_date: OffsetDateTime::UNIX_EPOCH,
                scheduled_publication_date: Some(future),
                content_path: Some(PathBuf::from("ep.mkv")),
            })
            .await
            .unwrap();

        scheduler.tick().await.unwrap();
        let release = repo.get(later).await.unwrap().unwrap();
        assert!(!release.is_visible);
        assert_eq!(release.scheduled_publication_date, Some(future));
    }
}
