use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::cli::Cli;
use crate::retry::RetryConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("Cannot parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Missing required settings: {}", missing.join(", "))]
    Missing { missing: Vec<String> },
    #[error("Server URL must start with http:// or https:// (got '{0}')")]
    InvalidUrl(String),
}

/// On-disk layout of the config file: one `[immich]` table, every key
/// optional so the CLI can fill the gaps.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    immich: ConfigSection,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigSection {
    url: Option<String>,
    api_key: Option<String>,
    photodir: Option<String>,
    album: Option<String>,
    raw: Option<bool>,
    concurrency: Option<usize>,
    retries: Option<u32>,
    backoff_secs: Option<u64>,
    thumbnail_command: Option<String>,
}

/// Resolved settings for one run, after merging CLI flags over the config
/// file. CLI wins per field; missing required fields are reported together.
pub struct Config {
    pub url: String,
    pub api_key: String,
    pub album: String,
    pub photodir: PathBuf,
    pub thumbnail_command: Option<String>,
    pub concurrency: usize,
    pub retry: RetryConfig,
    pub raw: bool,
    pub no_progress_bar: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("album", &self.album)
            .field("photodir", &self.photodir)
            .field("raw", &self.raw)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Treat absent and blank values the same; hand-edited config files often
/// carry empty `key = ""` lines.
fn require(value: Option<String>, name: &str, missing: &mut Vec<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => {
            missing.push(name.to_string());
            String::new()
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let path = PathBuf::from(&cli.config);
        let file = read_config_file(&path)?;
        Self::merge(cli, file.immich)
    }

    fn merge(cli: &Cli, file: ConfigSection) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let url = require(cli.url.clone().or(file.url), "url", &mut missing);
        let api_key = require(cli.api_key.clone().or(file.api_key), "api_key", &mut missing);
        let photodir = require(
            cli.photodir.clone().or(file.photodir),
            "photodir",
            &mut missing,
        );
        let album = require(cli.album.clone().or(file.album), "album", &mut missing);
        if !missing.is_empty() {
            return Err(ConfigError::Missing { missing });
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(url));
        }

        Ok(Self {
            url,
            api_key,
            album,
            photodir: expand_tilde(&photodir),
            thumbnail_command: file.thumbnail_command,
            concurrency: cli.concurrency.or(file.concurrency).unwrap_or(5).max(1),
            retry: RetryConfig {
                attempts: cli.retries.or(file.retries).unwrap_or(3),
                backoff_factor: Duration::from_secs(file.backoff_secs.unwrap_or(1)),
            },
            raw: cli.raw_override().or(file.raw).unwrap_or(false),
            no_progress_bar: cli.no_progress_bar,
        })
    }
}

/// A missing config file is not an error; everything can come from the CLI.
fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ConfigFile::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
