pub mod sources;

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub http: HttpConfig,
    pub map: MapConfig,
    pub boards: BoardsConfig,
    pub cache: CacheConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    /// Bucket that relative photo paths (`photo/...`) resolve against.
    pub image_base_url: Url,
    pub registration_path: String,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub read_timeout: Duration,
    /// Registration and other write-class calls.
    pub write_timeout: Duration,
    pub retry_backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct MapConfig {
    pub debounce: Duration,
    pub result_limit: u32,
    pub near_identical_epsilon: f64,
}

#[derive(Debug, Clone)]
pub struct BoardsConfig {
    pub per_page: u32,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    /// On-disk location; `None` keeps the photo cache in memory.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
