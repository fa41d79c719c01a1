//! Browser configuration.
//!
//! Priority: environment variables > settings file > defaults. The settings file is
//! `remote-browser/settings.json` in the platform config directory.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::thumbnails::{DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_CONCURRENT};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_millis(100);

const ENV_SERVER_URL: &str = "SERVER_URL";
const ENV_TOKEN: &str = "REMOTE_BROWSER_TOKEN";
const ENV_THUMB_CONCURRENCY: &str = "REMOTE_BROWSER_THUMB_CONCURRENCY";
const ENV_THUMB_CACHE: &str = "REMOTE_BROWSER_THUMB_CACHE";
const ENV_PAGE_SIZE: &str = "REMOTE_BROWSER_PAGE_SIZE";

/// Error reading the settings file.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "Couldn't read {}: {message}", path.display()),
            Self::Parse { path, message } => write!(f, "Couldn't parse {}: {message}", path.display()),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Contents of `settings.json`. Every key is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub server_url: Option<String>,
    pub token: Option<String>,
    pub initial_page_size: Option<usize>,
    pub page_size: Option<usize>,
    pub batch_size: Option<usize>,
    pub thumbnail_concurrency: Option<usize>,
    pub thumbnail_cache_capacity: Option<usize>,
    pub cancel_grace_ms: Option<u64>,
}

/// Default location of the settings file, if the platform has a config directory.
pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("remote-browser").join("settings.json"))
}

/// Reads settings from `path`. A missing file is the same as an empty one.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Settings::default()),
        Err(e) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
        }
    };
    serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Reads the default settings file. Problems are logged and yield defaults.
pub fn load_settings() -> Settings {
    let Some(path) = settings_path() else {
        return Settings::default();
    };
    load_settings_from(&path).unwrap_or_else(|e| {
        log::warn!("Ignoring settings file: {e}");
        Settings::default()
    })
}

/// Configuration of the browsing core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    pub server_url: String,
    /// Bearer token, owned by the auth flow
    pub token: Option<String>,
    /// Limit of the first page of a folder
    pub initial_page_size: usize,
    /// Limit of every `load_more` page
    pub page_size: usize,
    /// Entries per batch handed to the controller
    pub batch_size: usize,
    pub thumbnail_concurrency: usize,
    pub thumbnail_cache_capacity: usize,
    /// How long a cancelled listing gets to stop before it is abandoned
    pub cancel_grace: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            server_url: String::from(DEFAULT_SERVER_URL),
            token: None,
            initial_page_size: DEFAULT_PAGE_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            thumbnail_concurrency: DEFAULT_MAX_CONCURRENT,
            thumbnail_cache_capacity: DEFAULT_CACHE_CAPACITY,
            cancel_grace: DEFAULT_CANCEL_GRACE,
        }
    }
}

fn positive(value: Option<String>) -> Option<usize> {
    value.and_then(|v| v.trim().parse().ok()).filter(|&n: &usize| n > 0)
}

impl BrowserConfig {
    /// Loads the settings file and applies environment overrides.
    pub fn from_env() -> Self {
        Self::from_settings_and_env(&load_settings())
    }

    /// Priority: env vars > `settings` > defaults.
    pub fn from_settings_and_env(settings: &Settings) -> Self {
        Self::resolve(settings, |key| env::var(key).ok())
    }

    /// Resolves every field from `lookup` (environment), then `settings`, then defaults.
    /// Zero sizes are ignored at every level.
    pub fn resolve(settings: &Settings, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let from_settings = |value: Option<usize>| value.filter(|&n| n > 0);

        let server_url = lookup(ENV_SERVER_URL)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| settings.server_url.clone())
            .unwrap_or(defaults.server_url);

        let token = lookup(ENV_TOKEN)
            .filter(|v| !v.is_empty())
            .or_else(|| settings.token.clone());

        // The page size variable sets both the first and the following pages
        let env_page_size = positive(lookup(ENV_PAGE_SIZE));
        let initial_page_size = env_page_size
            .or(from_settings(settings.initial_page_size))
            .unwrap_or(defaults.initial_page_size);
        let page_size = env_page_size
            .or(from_settings(settings.page_size))
            .unwrap_or(defaults.page_size);

        let thumbnail_concurrency = positive(lookup(ENV_THUMB_CONCURRENCY))
            .or(from_settings(settings.thumbnail_concurrency))
            .unwrap_or(defaults.thumbnail_concurrency);
        let thumbnail_cache_capacity = positive(lookup(ENV_THUMB_CACHE))
            .or(from_settings(settings.thumbnail_cache_capacity))
            .unwrap_or(defaults.thumbnail_cache_capacity);

        Self {
            server_url,
            token,
            initial_page_size,
            page_size,
            batch_size: from_settings(settings.batch_size).unwrap_or(defaults.batch_size),
            thumbnail_concurrency,
            thumbnail_cache_capacity,
            cancel_grace: settings
                .cancel_grace_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.cancel_grace),
        }
    }
}
