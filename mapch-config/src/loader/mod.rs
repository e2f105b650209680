pub mod error;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use url::Url;

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_BOARDS_PER_PAGE, DEFAULT_DEBOUNCE_MS,
    DEFAULT_IMAGE_BASE_URL, DEFAULT_NEAR_IDENTICAL_EPSILON,
    DEFAULT_READ_TIMEOUT_MS, DEFAULT_REGISTRATION_PATH, DEFAULT_RESULT_LIMIT,
    DEFAULT_RETRY_BACKOFF_MS, DEFAULT_WRITE_TIMEOUT_MS, ENV_CONFIG_PATH,
};
use crate::models::sources::{EnvConfig, FileConfig};
use crate::models::{
    ApiConfig, BoardsConfig, CacheConfig, Config, ConfigMetadata, HttpConfig,
    MapConfig,
};
use crate::util::{non_empty, parse_duration};
use crate::validation::ConfigWarnings;

use error::ConfigLoadError;

/// Result of a successful load: the resolved config plus anything worth
/// telling the operator about.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

/// Composes a [`Config`] from an optional TOML file, an optional `.env`
/// file and the process environment. Environment values win over the file.
#[derive(Debug, Default, Clone)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Load using the process environment.
    ///
    /// The `.env` file, if configured, is applied first so its values show
    /// up in [`EnvConfig::gather`]. `MAPCH_CONFIG` names the TOML file when
    /// no explicit path was set.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|source| {
                    ConfigLoadError::EnvFile {
                        path: path.clone(),
                        source,
                    }
                })?;
                debug!("loaded env file {}", path.display());
                true
            }
            None => false,
        };

        let config_path = self.config_path.clone().or_else(|| {
            non_empty(std::env::var(ENV_CONFIG_PATH).ok()).map(PathBuf::from)
        });

        let mut load = Self::compose(config_path, EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Load with an explicit environment snapshot. The `.env` file and
    /// `MAPCH_CONFIG` are ignored.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        Self::compose(self.config_path.clone(), env)
    }

    fn compose(
        config_path: Option<PathBuf>,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let file = match &config_path {
            Some(path) => read_file_config(path)?,
            None => FileConfig::default(),
        };

        let api = ApiConfig {
            base_url: resolve_url(
                "api.base_url",
                env.api_base_url.or(file.api.base_url),
                DEFAULT_API_BASE_URL,
            )?,
            image_base_url: resolve_url(
                "api.image_base_url",
                env.image_base_url.or(file.api.image_base_url),
                DEFAULT_IMAGE_BASE_URL,
            )?,
            registration_path: non_empty(
                env.registration_path.or(file.api.registration_path),
            )
            .map(|p| p.trim_start_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_REGISTRATION_PATH.to_string()),
        };

        let http = HttpConfig {
            read_timeout: resolve_duration(
                "http.read_timeout",
                env.read_timeout.or(file.http.read_timeout),
                DEFAULT_READ_TIMEOUT_MS,
            )?,
            write_timeout: resolve_duration(
                "http.write_timeout",
                env.write_timeout.or(file.http.write_timeout),
                DEFAULT_WRITE_TIMEOUT_MS,
            )?,
            retry_backoff: resolve_duration(
                "http.retry_backoff",
                env.retry_backoff.or(file.http.retry_backoff),
                DEFAULT_RETRY_BACKOFF_MS,
            )?,
        };
        if http.read_timeout.is_zero() {
            return Err(ConfigLoadError::ZeroValue {
                field: "http.read_timeout",
            });
        }
        if http.write_timeout.is_zero() {
            return Err(ConfigLoadError::ZeroValue {
                field: "http.write_timeout",
            });
        }

        let result_limit = match env.result_limit {
            Some(raw) => parse_number("map.result_limit", &raw)?,
            None => file.map.result_limit.unwrap_or(DEFAULT_RESULT_LIMIT),
        };
        if result_limit == 0 {
            return Err(ConfigLoadError::ZeroValue {
                field: "map.result_limit",
            });
        }
        let map = MapConfig {
            debounce: resolve_duration(
                "map.debounce",
                env.debounce.or(file.map.debounce),
                DEFAULT_DEBOUNCE_MS,
            )?,
            result_limit,
            near_identical_epsilon: file
                .map
                .near_identical_epsilon
                .filter(|eps| eps.is_finite() && *eps >= 0.0)
                .unwrap_or(DEFAULT_NEAR_IDENTICAL_EPSILON),
        };

        let per_page = match env.boards_per_page {
            Some(raw) => parse_number("boards.per_page", &raw)?,
            None => file.boards.per_page.unwrap_or(DEFAULT_BOARDS_PER_PAGE),
        };
        if per_page == 0 {
            return Err(ConfigLoadError::ZeroValue {
                field: "boards.per_page",
            });
        }

        let cache = CacheConfig {
            enabled: env.cache_enabled.or(file.cache.enabled).unwrap_or(true),
            dir: env.cache_dir.or(file.cache.dir),
        };

        let config = Config {
            api,
            http,
            map,
            boards: BoardsConfig { per_page },
            cache,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded: false,
            },
        };

        let warnings = ConfigWarnings::collect(&config);
        for warning in warnings.iter() {
            info!("config: {warning}");
        }

        Ok(ConfigLoad { config, warnings })
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve_url(
    field: &'static str,
    raw: Option<String>,
    default: &str,
) -> Result<Url, ConfigLoadError> {
    let raw = non_empty(raw).unwrap_or_else(|| default.to_string());
    // A trailing slash keeps `Url::join` from dropping the last segment.
    let normalized = if raw.ends_with('/') {
        raw
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&normalized)
        .map_err(|source| ConfigLoadError::InvalidUrl { field, source })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigLoadError::UnsupportedScheme {
            field,
            scheme: other.to_string(),
        }),
    }
}

fn resolve_duration(
    field: &'static str,
    raw: Option<String>,
    default_ms: u64,
) -> Result<Duration, ConfigLoadError> {
    match non_empty(raw) {
        Some(value) => parse_duration(&value)
            .ok_or(ConfigLoadError::InvalidDuration { field, value }),
        None => Ok(Duration::from_millis(default_ms)),
    }
}

fn parse_number(
    field: &'static str,
    raw: &str,
) -> Result<u32, ConfigLoadError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ConfigLoadError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}
