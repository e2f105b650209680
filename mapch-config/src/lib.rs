//! Configuration for the map channel client.
//!
//! Values come from an optional TOML file and `MAPCH_*` environment
//! variables, with the environment taking precedence. Every setting has a
//! default, so an empty environment yields a working configuration pointed
//! at the production backend.

pub mod constants;
pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, error::ConfigLoadError};
pub use models::sources::{EnvConfig, FileConfig};
pub use models::{
    ApiConfig, BoardsConfig, CacheConfig, Config, ConfigMetadata, HttpConfig,
    MapConfig,
};
pub use validation::{ConfigWarning, ConfigWarnings};

impl Config {
    /// Defaults only, with no file or environment input.
    pub fn defaults() -> Result<Self, ConfigLoadError> {
        ConfigLoader::new()
            .load_with_env(EnvConfig::default())
            .map(|load| load.config)
    }
}
