use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::util::{non_empty, parse_bool};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub api: FileApiConfig,
    #[serde(default)]
    pub http: FileHttpConfig,
    #[serde(default)]
    pub map: FileMapConfig,
    #[serde(default)]
    pub boards: FileBoardsConfig,
    #[serde(default)]
    pub cache: FileCacheConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileApiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_path: Option<String>,
}

/// Durations are humantime strings (`"15s"`) or bare milliseconds.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileHttpConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_backoff: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileMapConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub near_identical_epsilon: Option<f64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileBoardsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCacheConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Environment-derived configuration values.
///
/// Numeric and duration values stay as raw strings here so the loader can
/// report exactly which variable failed to parse.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub api_base_url: Option<String>,
    pub image_base_url: Option<String>,
    pub registration_path: Option<String>,
    pub read_timeout: Option<String>,
    pub write_timeout: Option<String>,
    pub retry_backoff: Option<String>,
    pub debounce: Option<String>,
    pub result_limit: Option<String>,
    pub boards_per_page: Option<String>,
    pub cache_enabled: Option<bool>,
    pub cache_dir: Option<PathBuf>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, which keeps tests away from the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| non_empty(lookup(key));
        Self {
            api_base_url: var("MAPCH_API_BASE_URL"),
            image_base_url: var("MAPCH_IMAGE_BASE_URL"),
            registration_path: var("MAPCH_REGISTRATION_PATH"),
            read_timeout: var("MAPCH_READ_TIMEOUT"),
            write_timeout: var("MAPCH_WRITE_TIMEOUT"),
            retry_backoff: var("MAPCH_RETRY_BACKOFF"),
            debounce: var("MAPCH_DEBOUNCE"),
            result_limit: var("MAPCH_RESULT_LIMIT"),
            boards_per_page: var("MAPCH_BOARDS_PER_PAGE"),
            cache_enabled: var("MAPCH_CACHE_ENABLED")
                .and_then(|raw| parse_bool(&raw)),
            cache_dir: var("MAPCH_CACHE_DIR").map(PathBuf::from),
        }
    }
}
