//! Command-line, environment and config-file settings.
//!
//! Precedence: command line > `STAR_SYNC_*` environment > TOML config file.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use clap::Args;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Options shared by every binary.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// TOML file with any of the options below
    #[arg(long, env = "STAR_SYNC_CONFIG_PATH")]
    pub config_path: Option<PathBuf>,

    /// Path to the music library database
    #[arg(long, env = "STAR_SYNC_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Local library user whose stars are synced
    #[arg(long, env = "STAR_SYNC_LOCAL_USERNAME")]
    pub local_username: Option<String>,

    /// Last.fm account whose loved tracks are synced
    #[arg(long, env = "STAR_SYNC_LASTFM_USERNAME")]
    pub lastfm_username: Option<String>,

    /// Overrides the API key stored in the library settings
    #[arg(long, env = "STAR_SYNC_LASTFM_API_KEY", hide_env_values = true)]
    pub lastfm_api_key: Option<String>,

    /// Overrides the API secret stored in the library settings
    #[arg(long, env = "STAR_SYNC_LASTFM_SECRET", hide_env_values = true)]
    pub lastfm_secret: Option<String>,
}

/// Options that only affect a full sync run.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Unix timestamp (seconds); older local stars are never sent to Last.fm
    #[arg(long, env = "STAR_SYNC_MIN_STAR_DATE")]
    pub min_star_date: Option<i64>,

    /// Do not copy Last.fm loves into the library
    #[arg(long, env = "STAR_SYNC_SKIP_IMPORT")]
    pub skip_import: bool,

    /// Do not send library stars to Last.fm
    #[arg(long, env = "STAR_SYNC_SKIP_EXPORT")]
    pub skip_export: bool,
}

/// Config file contents. Every key is optional.
#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub db_path: Option<PathBuf>,
    pub local_username: Option<String>,
    pub lastfm_username: Option<String>,
    pub lastfm_api_key: Option<String>,
    pub lastfm_secret: Option<String>,
    pub min_star_date: Option<i64>,
    pub skip_import: Option<bool>,
    pub skip_export: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Fully merged settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub db_path: PathBuf,
    pub local_username: Option<String>,
    pub lastfm_username: Option<String>,
    pub lastfm_api_key: Option<String>,
    pub lastfm_secret: Option<String>,
    pub min_star_date: Option<DateTime<Utc>>,
    pub skip_import: bool,
    pub skip_export: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Read the config file named by `common` (if any) and merge.
    pub fn load(common: &CommonArgs, run: &RunArgs) -> Result<Self> {
        let file = match &common.config_path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(common.clone(), run.clone(), file)
    }

    pub fn merge(common: CommonArgs, run: RunArgs, file: FileConfig) -> Result<Self> {
        let Some(db_path) = common.db_path.or(file.db_path) else {
            bail!("Please provide a database path (--db-path, STAR_SYNC_DB_PATH or db_path in the config file)");
        };

        let min_star_date = match run.min_star_date.or(file.min_star_date) {
            Some(secs) if secs > 0 => match Utc.timestamp_opt(secs, 0).single() {
                Some(date) => Some(date),
                None => bail!("Invalid min star date: {}", secs),
            },
            Some(secs) if secs < 0 => bail!("Invalid min star date: {}", secs),
            _ => None,
        };

        Ok(Self {
            db_path,
            local_username: non_empty(common.local_username.or(file.local_username)),
            lastfm_username: non_empty(common.lastfm_username.or(file.lastfm_username)),
            lastfm_api_key: non_empty(common.lastfm_api_key.or(file.lastfm_api_key)),
            lastfm_secret: non_empty(common.lastfm_secret.or(file.lastfm_secret)),
            min_star_date,
            skip_import: run.skip_import || file.skip_import.unwrap_or(false),
            skip_export: run.skip_export || file.skip_export.unwrap_or(false),
        })
    }

    pub fn local_username(&self) -> Result<&str> {
        match &self.local_username {
            Some(name) => Ok(name),
            None => bail!("Please provide a local username (--local-username or STAR_SYNC_LOCAL_USERNAME)"),
        }
    }

    pub fn lastfm_username(&self) -> Result<&str> {
        match &self.lastfm_username {
            Some(name) => Ok(name),
            None => bail!("Please provide a Last.fm username (--lastfm-username or STAR_SYNC_LASTFM_USERNAME)"),
        }
    }
}
