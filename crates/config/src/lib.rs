//! Layered configuration for the koukai publication pipeline.
//!
//! Values are resolved in three layers, later layers overriding earlier ones:
//!
//! 1. hard-coded defaults,
//! 2. an optional TOML file (`--config`, or `koukai.toml` in the platform
//!    configuration directory),
//! 3. `KOUKAI_*` environment variables, nested keys separated by `__`
//!    (e.g. `KOUKAI_PATHS__DATA_DIR`).
//!
//! Publisher credential tables are optional: a deployment that leaves the
//! `[publishers.anidex]` table out simply does not announce there.

pub mod error;

pub use crate::error::{Error, ErrorKind, Result};

use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: Paths,
    pub torrent: Torrent,
    pub publishers: Publishers,
    pub retry: Retry,
    pub scheduler: Scheduler,
}

/// Filesystem locations the pipeline reads from and writes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Read-only tree holding released content; a release's content path
    /// is relative to this root.
    pub data_dir: PathBuf,
    /// Persistent directory for generated `.torrent` artifacts.
    pub torrents_dir: PathBuf,
    /// Watch directory of the download client. The client renames files it
    /// has consumed to `<name>.added` at arbitrary points in time, so this
    /// must stay separate from `torrents_dir` and is only ever written
    /// fire-and-forget.
    pub transmission_watchdir: PathBuf,
    /// Watch directory of the IRC relay bot (receives symlinks to content).
    pub ircbot_watchdir: PathBuf,
    /// SQLite database file holding the release ledger.
    pub database: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        let root = directories::ProjectDirs::from("", "", "koukai")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("/var/lib/koukai"));
        Self {
            data_dir: root.join("data"),
            torrents_dir: root.join("torrents"),
            transmission_watchdir: root.join("transmission-watchdir"),
            ircbot_watchdir: root.join("ircbot-watchdir"),
            database: root.join("koukai.sqlite3"),
        }
    }
}

/// Torrent construction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Torrent {
    /// Announce URLs embedded in every built torrent. Changing this list
    /// does not invalidate existing artifacts (the info hash depends only
    /// on content layout).
    pub trackers: Vec<String>,
    /// Upper bound on the computed piece size, in bytes. Caps per-piece
    /// overhead on very large batched releases.
    pub max_piece_size: u32,
}

impl Default for Torrent {
    fn default() -> Self {
        Self {
            trackers: vec![
                "http://anidex.moe:6969/announce".to_string(),
                "http://nyaa.tracker.wf:7777/announce".to_string(),
                "udp://tracker.uw0.xyz:6969".to_string(),
            ],
            max_piece_size: 4 * 1024 * 1024,
        }
    }
}

/// Optional external index integrations. Absent table, absent publisher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Publishers {
    pub anidex: Option<Anidex>,
    pub nyaa_si: Option<NyaaSi>,
    pub nyaa_pantsu: Option<NyaaPantsu>,
}

/// anidex.info upload endpoint. Credentials travel as form fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anidex {
    #[serde(default = "Anidex::default_api_url")]
    pub api_url: String,
    pub api_key: String,
    pub group_id: u32,
    #[serde(default = "Anidex::default_category_id")]
    pub category_id: u32,
    #[serde(default = "Anidex::default_language_id")]
    pub language_id: u32,
    /// Immediate in-call retries to absorb flaky responses, before the
    /// task-level retry policy even gets involved.
    #[serde(default = "Anidex::default_max_retries")]
    pub max_retries: u32,
}

impl Anidex {
    fn default_api_url() -> String {
        "https://anidex.info/api/".to_string()
    }
    fn default_category_id() -> u32 {
        1
    }
    fn default_language_id() -> u32 {
        1
    }
    fn default_max_retries() -> u32 {
        3
    }
}

/// nyaa.si upload endpoint. Authenticates with HTTP basic auth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NyaaSi {
    #[serde(default = "NyaaSi::default_api_url")]
    pub api_url: String,
    pub username: String,
    pub password: String,
    /// "Information" link shown alongside the upload (the group website).
    pub information: String,
    #[serde(default = "NyaaSi::default_category_id")]
    pub category_id: String,
}

impl NyaaSi {
    fn default_api_url() -> String {
        "https://nyaa.si/api/upload".to_string()
    }
    fn default_category_id() -> String {
        "1_2".to_string()
    }
}

/// nyaa.net upload endpoint. Authenticates with an `Authorization` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NyaaPantsu {
    #[serde(default = "NyaaPantsu::default_api_url")]
    pub api_url: String,
    pub username: String,
    pub api_key: String,
    /// Website link attached to the upload.
    pub website: String,
    #[serde(default = "NyaaPantsu::default_category_id")]
    pub category_id: String,
    #[serde(default = "NyaaPantsu::default_languages")]
    pub languages: String,
}

impl NyaaPantsu {
    fn default_api_url() -> String {
        "https://nyaa.net/api/upload".to_string()
    }
    fn default_category_id() -> String {
        "3_5".to_string()
    }
    fn default_languages() -> String {
        "en".to_string()
    }
}

/// Task-substrate retry policy (the outer layer around each publisher call).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Retry {
    /// Attempts per publisher task, including the first.
    pub task_attempts: u32,
    /// Initial delay between attempts; doubles after every failure.
    pub backoff_ms: u64,
    /// Hard wall-clock budget for a whole task. On expiry the runtime
    /// terminates the task; there is no cooperative cancellation.
    pub timeout_secs: u64,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            task_attempts: 10,
            backoff_ms: 500,
            timeout_secs: 30 * 60,
        }
    }
}

/// Periodic scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scheduler {
    pub period_secs: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self { period_secs: 60 }
    }
}

impl Config {
    /// Load and validate the configuration.
    ///
    /// `file` overrides the default configuration file location; a missing
    /// file is not an error (defaults plus environment still apply).
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file = file.map(Path::to_path_buf).or_else(Self::default_file);
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            tracing::debug!(path = %path.display(), "reading configuration file");
            figment = figment.merge(Toml::file(path));
        }
        let config: Self = figment
            .merge(Env::prefixed("KOUKAI_").split("__"))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// `koukai.toml` in the platform configuration directory, if resolvable.
    fn default_file() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "koukai")
            .map(|dirs| dirs.config_dir().join("koukai.toml"))
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        for path in [
            &self.paths.data_dir,
            &self.paths.torrents_dir,
            &self.paths.transmission_watchdir,
            &self.paths.ircbot_watchdir,
            &self.paths.database,
        ] {
            if !path.is_absolute() {
                exn::bail!(ErrorKind::RelativePath(path.clone()));
            }
        }
        if self.paths.torrents_dir == self.paths.transmission_watchdir {
            // The download client renames watch-dir files underneath us;
            // sharing the directory with the build output races with it.
            exn::bail!(ErrorKind::Invalid(
                "torrents_dir and transmission_watchdir must differ"
            ));
        }
        if self.torrent.trackers.is_empty() {
            exn::bail!(ErrorKind::Invalid("at least one tracker is required"));
        }
        if self.torrent.max_piece_size < 16 * 1024 || !self.torrent.max_piece_size.is_power_of_two()
        {
            exn::bail!(ErrorKind::Invalid(
                "max_piece_size must be a power of two of at least 16 KiB"
            ));
        }
        if self.retry.task_attempts == 0 {
            exn::bail!(ErrorKind::Invalid("task_attempts must be at least 1"));
        }
        if self.scheduler.period_secs == 0 {
            exn::bail!(ErrorKind::Invalid("scheduler period must be non-zero"));
        }
        if let Some(anidex) = &self.publishers.anidex
            && anidex.max_retries == 0
        {
            exn::bail!(ErrorKind::Invalid("anidex max_retries must be at least 1"));
        }
        Ok(())
    }
}
